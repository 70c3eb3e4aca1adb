//! Razorpay payment signature (HMAC-SHA256)
//!
//! `signature = hex(HMAC_SHA256(key_secret, "{gateway_order_id}|{payment_id}"))`

use hmac::{Hmac, Mac};
use sha2::Sha256;

const SIGNATURE_HEX_LEN: usize = 64;

fn mac_for(secret: &str, gateway_order_id: &str, payment_id: &str) -> Result<Hmac<Sha256>, &'static str> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

/// Lowercase hex signature for the pair
pub fn expected_signature(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
) -> Result<String, &'static str> {
    let mac = mac_for(secret, gateway_order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Exact match against the lowercase hex digest.
///
/// Uppercase or otherwise re-encoded hex is rejected.
pub fn verify_payment_signature(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), &'static str> {
    let well_formed = signature.len() == SIGNATURE_HEX_LEN
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return Err("Invalid signature format");
    }

    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    // constant-time
    mac_for(secret, gateway_order_id, payment_id)?
        .verify_slice(&sig_bytes)
        .map_err(|_| "Payment signature mismatch")
}
