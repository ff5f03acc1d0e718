use axum::http::{HeaderMap, HeaderValue};
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the one-shot message shown after an upload.
pub const FLASH_COOKIE: &str = "upload_message";

/// MAC over `<cookie name>|<value>`, so a value signed for one cookie does
/// not verify as another.
fn cookie_mac(secret: &str, name: &str, value: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(name.as_bytes());
    mac.update(b"|");
    mac.update(value.as_bytes());
    Some(mac)
}

pub fn create_signed_cookie(secret: &str, name: &str, value: &str) -> Result<String, String> {
    let mac = cookie_mac(secret, name, value).ok_or("Invalid secret key")?;
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}:{}", value, signature_b64))
}

/// The value of cookie `name` if its signature checks out. The signature
/// follows the last `:`, so values may contain colons themselves.
pub fn verified_value<'a>(secret: &str, name: &str, signed_value: &'a str) -> Option<&'a str> {
    let (value, signature_b64) = signed_value.rsplit_once(':')?;
    let signature = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    let mac = cookie_mac(secret, name, value)?;
    mac.verify_slice(&signature).ok()?;
    Some(value)
}

pub fn verify_signed_cookie(secret: &str, name: &str, signed_value: &str) -> bool {
    verified_value(secret, name, signed_value).is_some()
}

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            if key.trim() == name {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
}

/// `Set-Cookie` value for an HttpOnly, SameSite=Lax cookie on `/`.
pub fn cookie_header(name: &str, value: &str, max_age_secs: u64) -> Option<HeaderValue> {
    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        name, value, max_age_secs
    );
    match HeaderValue::from_str(&cookie) {
        Ok(header) => Some(header),
        Err(e) => {
            error!("Invalid cookie value for {}: {}", name, e);
            None
        }
    }
}

/// `Set-Cookie` value that removes `name`.
pub fn expired_cookie_header(name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("invalid=; Max-Age=0"))
}

/// Store `message` for display on the next page view.
pub fn flash_cookie_header(secret: &str, message: &str) -> Option<HeaderValue> {
    let encoded = urlencoding::encode(message);
    match create_signed_cookie(secret, FLASH_COOKIE, &encoded) {
        Ok(signed) => cookie_header(FLASH_COOKIE, &signed, 300),
        Err(e) => {
            error!("Failed to sign upload message: {}", e);
            None
        }
    }
}

/// Read the pending message, if any. Tampered cookies are ignored.
pub fn read_flash(headers: &HeaderMap, secret: &str) -> Option<String> {
    let signed = get_cookie_value(headers, FLASH_COOKIE)?;
    let Some(encoded) = verified_value(secret, FLASH_COOKIE, &signed) else {
        warn!("Ignoring upload message with a bad signature");
        return None;
    };
    urlencoding::decode(encoded).ok().map(|m| m.into_owned())
}
