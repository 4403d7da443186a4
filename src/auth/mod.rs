use axum::http::HeaderMap;

/// Identify the calling user from the HTTP Authorization header.
///
/// Expected format: "Authorization: Bearer <user-token>". The bearer
/// token carries the user id issued at application login; full identity
/// verification happens in the outer auth layer before requests reach
/// these routers.
pub fn authenticate_user(headers: &HeaderMap) -> Result<i64, TokenError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    let token = parse_bearer_token(auth_header)?;

    token.parse::<i64>().map_err(|_| TokenError::InvalidFormat)
}

/// Parse bearer token from Authorization header value
fn parse_bearer_token(header_value: &str) -> Result<String, TokenError> {
    // Expect "Bearer <token>"
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 {
        return Err(TokenError::InvalidFormat);
    }

    if parts[0].to_lowercase() != "bearer" {
        return Err(TokenError::InvalidFormat);
    }

    let token = parts[1].trim();

    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Authorization header not present
    Missing,
    /// Invalid format (not "Bearer <token>" or not a user id)
    InvalidFormat,
    /// Token is empty string
    Empty,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Authorization token not provided"),
            TokenError::InvalidFormat => write!(f, "Invalid authorization token format"),
            TokenError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_valid_bearer_token() {
        assert_eq!(authenticate_user(&headers_with("Bearer 42")), Ok(42));
        // Scheme is case-insensitive
        assert_eq!(authenticate_user(&headers_with("bearer 7")), Ok(7));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            authenticate_user(&HeaderMap::new()),
            Err(TokenError::Missing)
        );
    }

    #[test]
    fn test_invalid_formats() {
        assert_eq!(
            authenticate_user(&headers_with("Bearer")),
            Err(TokenError::InvalidFormat)
        );
        assert_eq!(
            authenticate_user(&headers_with("Basic 42")),
            Err(TokenError::InvalidFormat)
        );
        assert_eq!(
            authenticate_user(&headers_with("Bearer not-a-user-id")),
            Err(TokenError::InvalidFormat)
        );
    }

    #[test]
    fn test_empty_token() {
        assert_eq!(
            authenticate_user(&headers_with("Bearer ")),
            Err(TokenError::Empty)
        );
    }
}
