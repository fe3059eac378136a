use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{ProviderError, Result};

/// Encoded user data limit when commands are sent as POST.
pub const MAX_USER_DATA_POST: usize = 32768;
/// Encoded user data limit when every command must fit in a GET URL.
pub const MAX_USER_DATA_GET: usize = 2048;

/// Base64-encodes `user_data` unless it already is base64, then checks the
/// encoded size against the transport limit.
pub fn encode(user_data: &str, http_get_only: bool) -> Result<String> {
    let encoded = if BASE64.decode(user_data).is_ok() {
        user_data.to_string()
    } else {
        BASE64.encode(user_data)
    };

    let limit = if http_get_only {
        MAX_USER_DATA_GET
    } else {
        MAX_USER_DATA_POST
    };

    if encoded.len() > limit {
        return Err(ProviderError::UserData(format!(
            "the supplied user_data contains {} bytes after encoding, this exceeds the limit of {} bytes",
            encoded.len(),
            limit
        )));
    }

    Ok(encoded)
}

/// Decodes user data returned by the API so state matches the config when
/// the user supplied plain text.
pub fn decode_for_state(configured: &str, from_api: &str) -> String {
    if BASE64.decode(configured).is_ok() {
        return from_api.to_string();
    }
    BASE64
        .decode(from_api)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| from_api.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_encoded() {
        let encoded = encode("#!/bin/bash\necho hello\n", false).unwrap();
        assert_eq!(encoded, BASE64.encode("#!/bin/bash\necho hello\n"));
    }

    #[test]
    fn test_base64_is_kept() {
        let already = BASE64.encode("#cloud-config\npackages: [nginx]\n");
        assert_eq!(encode(&already, false).unwrap(), already);
    }

    #[test]
    fn test_post_limit() {
        let big = "#!/bin/sh\n".repeat(3000);
        let err = encode(&big, false).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit of 32768 bytes"));
    }

    #[test]
    fn test_get_limit_is_smaller() {
        let medium = "#!/bin/sh\n".repeat(300);
        assert!(encode(&medium, false).is_ok());
        let err = encode(&medium, true).unwrap_err();
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn test_decode_for_state() {
        let plain = "#!/bin/sh\necho hi\n";
        let from_api = BASE64.encode(plain);
        assert_eq!(decode_for_state(plain, &from_api), plain);
        assert_eq!(decode_for_state(&from_api, &from_api), from_api);
    }
}
