//! Input validation helpers
//!
//! Centralized text length constants and validation functions used by the
//! catalog, cart, review and checkout handlers.

use shared::error::{AppError, ErrorCode};
use shared::models::ShippingAddress;

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: product, category, brand
pub const MAX_NAME_LEN: usize = 200;

/// Product descriptions
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// Review comments
pub const MAX_COMMENT_LEN: usize = 2000;

/// Short identifiers: phone, pincode, gateway ids
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// URLs / image paths
pub const MAX_URL_LEN: usize = 2048;

/// Address lines
pub const MAX_ADDRESS_LEN: usize = 500;

/// Upper bound on a single cart line
pub const MAX_LINE_QUANTITY: i32 = 9999;

/// Upper bound on a product price
pub const MAX_PRICE: f64 = 10_000_000.0;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::required(field));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Unwrap a required optional string, rejecting blanks.
pub fn require_text(value: Option<String>, field: &str, max_len: usize) -> Result<String, AppError> {
    let value = value.ok_or_else(|| AppError::required(field))?;
    validate_required_text(&value, field, max_len)?;
    Ok(value)
}

/// Price must be finite, non-negative and bounded.
pub fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 || price > MAX_PRICE {
        return Err(AppError::with_message(
            ErrorCode::ProductInvalidPrice,
            format!("price must be between 0 and {MAX_PRICE}, got {price}"),
        ));
    }
    Ok(())
}

/// Stock must be non-negative.
pub fn validate_stock(stock: i32) -> Result<(), AppError> {
    if stock < 0 {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!("stock must be non-negative, got {stock}"),
        )
        .with_detail("field", "stock"));
    }
    Ok(())
}

/// Cart quantity must be in `1..=MAX_LINE_QUANTITY`.
pub fn validate_quantity(quantity: i32) -> Result<(), AppError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(AppError::with_message(
            ErrorCode::CartInvalidQuantity,
            format!("quantity must be between 1 and {MAX_LINE_QUANTITY}, got {quantity}"),
        ));
    }
    Ok(())
}

/// Shipping address must be present with every required field filled in.
pub fn validate_shipping_address(
    address: Option<&ShippingAddress>,
) -> Result<&ShippingAddress, AppError> {
    let address = address.ok_or_else(|| AppError::required("shipping_address"))?;

    let missing = address.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::new(ErrorCode::OrderInvalidAddress)
            .with_detail("missing", missing));
    }

    validate_required_text(&address.full_name, "full_name", MAX_NAME_LEN)?;
    validate_required_text(&address.phone, "phone", MAX_SHORT_TEXT_LEN)?;
    validate_required_text(&address.pincode, "pincode", MAX_SHORT_TEXT_LEN)?;
    validate_required_text(&address.address_line1, "address_line1", MAX_ADDRESS_LEN)?;
    validate_optional_text(&address.address_line2, "address_line2", MAX_ADDRESS_LEN)?;
    validate_required_text(&address.city, "city", MAX_NAME_LEN)?;
    validate_required_text(&address.state, "state", MAX_NAME_LEN)?;
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".into(),
            phone: "9876543210".into(),
            pincode: "411001".into(),
            address_line1: "12 MG Road".into(),
            address_line2: None,
            city: "Pune".into(),
            state: "MH".into(),
        }
    }

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Mug", "name", MAX_NAME_LEN).is_ok());
        let err = validate_required_text("  ", "name", MAX_NAME_LEN).unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);
        let err = validate_required_text(&"x".repeat(201), "name", MAX_NAME_LEN).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_price_and_stock() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(-1.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-3).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert_eq!(
            validate_quantity(0).unwrap_err().code,
            ErrorCode::CartInvalidQuantity
        );
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_shipping_address() {
        let addr = address();
        assert!(validate_shipping_address(Some(&addr)).is_ok());

        let err = validate_shipping_address(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);

        let mut addr = address();
        addr.city = String::new();
        let err = validate_shipping_address(Some(&addr)).unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderInvalidAddress);
    }
}
