//! Implicit-grant token extraction
//!
//! The identity provider returns tokens in the fragment of the redirect URL.
//! Most navigation events during a login are intermediate pages without
//! tokens, so "nothing found" is an ordinary outcome here, not an error.

use url::Url;

use crate::security::SecureString;

/// OAuth client id of the provider's web login
pub const CLIENT_ID: &str = "play-valorant-web-prod";

/// Tokens recovered from a terminal redirect
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: SecureString,
    pub id_token: SecureString,
    pub expires_in_secs: Option<u64>,
}

/// Parses `access_token`, `id_token` and `expires_in` from a URL fragment
///
/// Returns `None` when the URL has no fragment, when either token is absent
/// or empty, or when the string is not a URL. Tokens in the query string are
/// ignored.
///
/// # Examples
///
/// ```
/// use vshop_lib::auth::extract_tokens;
///
/// let tokens = extract_tokens("https://x/#access_token=A&id_token=B&expires_in=600").unwrap();
/// assert_eq!(tokens.access_token.expose(), "A");
/// assert_eq!(tokens.id_token.expose(), "B");
/// assert_eq!(tokens.expires_in_secs, Some(600));
///
/// assert!(extract_tokens("https://x/").is_none());
/// ```
pub fn extract_tokens(url: &str) -> Option<TokenSet> {
    let parsed = Url::parse(url).ok()?;
    let fragment = parsed.fragment()?;

    let mut access_token = None;
    let mut id_token = None;
    let mut expires_in_secs = None;

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" if !value.is_empty() => {
                access_token = Some(SecureString::new(value.into_owned()))
            }
            "id_token" if !value.is_empty() => id_token = Some(SecureString::new(value.into_owned())),
            "expires_in" => expires_in_secs = value.parse().ok(),
            _ => {}
        }
    }

    Some(TokenSet {
        access_token: access_token?,
        id_token: id_token?,
        expires_in_secs,
    })
}

/// Builds the hosted-login URL for the implicit grant
pub fn login_url(auth_base: &Url, redirect_uri: &str) -> Url {
    let mut url = auth_base.clone();
    url.set_path("/authorize");
    url.query_pairs_mut()
        .clear()
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("client_id", CLIENT_ID)
        .append_pair("response_type", "token id_token")
        .append_pair("nonce", "1")
        .append_pair("scope", "account openid");
    url
}

/// Cheap structural check: three non-empty dot-separated segments
///
/// This does not verify the signature or decode the payload.
pub fn is_plausible_jwt(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}
