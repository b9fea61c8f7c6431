use data_encoding::BASE64;
use log::{debug, warn};

use crate::kubernetes::ClusterGateway;

/// Reads a secret's field and decodes it to plaintext.
///
/// Best-effort: any failure along the way (missing secret, empty field, malformed base64,
/// non-UTF-8 contents) yields an empty string.
pub async fn fetch_decoded_secret_field(
    gateway: &impl ClusterGateway,
    name: &str,
    namespace: &str,
    field: &str,
) -> String {
    let encoded = match gateway.secret_field(name, namespace, field).await {
        Ok(encoded) => encoded,
        Err(error) => {
            warn!("Couldn't read '{field}' of secret '{name}' in '{namespace}': {error}");
            return String::new();
        }
    };

    let encoded = encoded.trim();

    if encoded.is_empty() {
        debug!("Secret field '{field}' of '{name}' is empty");
        return String::new();
    }

    let decoded = match BASE64.decode(encoded.as_bytes()) {
        Ok(decoded) => decoded,
        Err(error) => {
            warn!("Secret field '{field}' of '{name}' isn't valid base64: {error}");
            return String::new();
        }
    };

    match String::from_utf8(decoded) {
        Ok(decoded) => decoded,
        Err(_) => {
            warn!("Secret field '{field}' of '{name}' isn't valid UTF-8");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fetch_decoded_secret_field;
    use crate::orchestrator::tests::FakeGateway;

    #[tokio::test]
    async fn decodes_existing_fields() {
        let gateway = FakeGateway::default().with_secret("ldap", "LDAP_ADMIN_PASSWORD", "UzNjcmV0IQ==");

        let value = fetch_decoded_secret_field(&gateway, "ldap", "infra", "LDAP_ADMIN_PASSWORD").await;

        assert_eq!(value, "S3cret!");
    }

    #[tokio::test]
    async fn failures_yield_an_empty_string() {
        let gateway = FakeGateway::default()
            .with_secret("empty", "password", "")
            .with_secret("garbage", "password", "not base64!")
            .with_secret("binary", "password", "//79");

        for name in ["missing", "empty", "garbage", "binary"] {
            assert_eq!(
                fetch_decoded_secret_field(&gateway, name, "infra", "password").await,
                "",
                "{name}"
            );
        }
    }
}
