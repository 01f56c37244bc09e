use crate::currency::Money;
use crate::ledger::LedgerError;

/// Parse a user-entered amount such as `"1,250.50"` or `"$10"` into a
/// positive [`Money`].
///
/// Payment forms run this before calling the ledger; the ledger itself only
/// checks the sign.
pub fn parse_amount(input: &str) -> Result<Money, LedgerError> {
    let invalid = |why: &str| LedgerError::InvalidAmount(format!("{why}: {input:?}"));

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed).trim_start();
    if trimmed.is_empty() {
        return Err(invalid("amount is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount must be positive"));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    let whole: String = whole.chars().filter(|c| *c != ',').collect();
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("amount is not a number"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("amount is not a number"));
    }
    if frac.len() > 2 {
        return Err(invalid("amount has more than two decimal places"));
    }

    let dollars: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("amount is too large"))?
    };
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid("amount is not a number"))? * 10,
        _ => frac.parse().map_err(|_| invalid("amount is not a number"))?,
    };
    let total = dollars
        .checked_mul(100)
        .and_then(|c| c.checked_add(cents))
        .ok_or_else(|| invalid("amount is too large"))?;

    let amount = Money::from_cents(total);
    if !amount.is_positive() {
        return Err(invalid("amount must be positive"));
    }
    Ok(amount)
}
