use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not a three-segment compact JWT, or the claims segment is garbage.
    Malformed,
    /// Well-formed token without an `exp` claim.
    MissingExpiry,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed auth token"),
            Self::MissingExpiry => write!(f, "auth token has no expiry claim"),
        }
    }
}

impl std::error::Error for TokenError {}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Decodes the expiry claim of a compact JWT. Claims are read locally, the
/// signature is not verified; liveness only gates whether a silent
/// reauthentication is attempted.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };
    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;
    let exp = claims.exp.ok_or(TokenError::MissingExpiry)?;
    Utc.timestamp_opt(exp, 0)
        .single()
        .ok_or(TokenError::Malformed)
}

/// True when the token is live at `now`. Any decoding failure counts as not
/// live; the caller decides whether that forces a reauth.
#[must_use]
pub fn is_live(token: &str, now: DateTime<Utc>) -> bool {
    decode_expiry(token).map(|exp| exp > now).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_with_claims(claims: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims);
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decodes_expiry() {
        let token = token_with_claims(r#"{"exp":2533860384,"sub":"u-123"}"#);
        let exp = decode_expiry(&token).expect("expiry");
        assert_eq!(exp.timestamp(), 2533860384);
        assert!(is_live(&token, Utc::now()));
    }

    #[test]
    fn expired_token_is_not_live() {
        let token = token_with_claims(r#"{"exp":1574720883}"#);
        assert!(decode_expiry(&token).is_ok());
        assert!(!is_live(&token, Utc::now()));
    }

    #[test]
    fn missing_expiry_claim() {
        let token = token_with_claims(r#"{"sub":"u-123"}"#);
        assert_eq!(decode_expiry(&token), Err(TokenError::MissingExpiry));
    }

    #[test]
    fn malformed_token() {
        assert_eq!(decode_expiry("definitely-not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(decode_expiry("a.b"), Err(TokenError::Malformed));
        assert!(!is_live("", Utc::now()));
    }
}
