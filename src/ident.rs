//! Resource identifiers of the form `<project>/<service>[/<name>]`.

use crate::error::ProviderError;

/// Join identifier parts with `/`.
pub fn build_resource_id(parts: &[&str]) -> String {
    parts.join("/")
}

/// Split an identifier into exactly `N` non-empty parts.
pub fn split_resource_id<const N: usize>(id: &str) -> Result<[&str; N], ProviderError> {
    let invalid = || {
        ProviderError::Validation(format!(
            "invalid identifier '{id}', expected {N} parts separated by '/'"
        ))
    };

    let mut parts = [""; N];
    let mut iter = id.split('/');
    for slot in parts.iter_mut() {
        *slot = iter.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
    }
    if iter.next().is_some() {
        return Err(invalid());
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_resource_id() {
        assert_eq!(build_resource_id(&["proj", "kafka-1"]), "proj/kafka-1");
        assert_eq!(
            build_resource_id(&["proj", "kafka-1", "events"]),
            "proj/kafka-1/events"
        );
    }

    #[test]
    fn test_split_resource_id() {
        let [project, service, topic] = split_resource_id::<3>("proj/kafka-1/events").unwrap();
        assert_eq!((project, service, topic), ("proj", "kafka-1", "events"));

        assert!(split_resource_id::<3>("proj/kafka-1").is_err());
        assert!(split_resource_id::<2>("proj/kafka-1/events").is_err());
        assert!(split_resource_id::<2>("proj/").is_err());
    }
}
