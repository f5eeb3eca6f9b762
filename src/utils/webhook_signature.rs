// SkipCash webhook signatures
// HMAC-SHA256 over a comma-joined field list, base64 encoded, sent in the Authorization header

use base64::prelude::*;
use ring::hmac;
use subtle::ConstantTimeEq;

use crate::models::SkipCashPayload;

/// `PaymentId=..,Amount=..,StatusId=..[,TransactionId=..][,Custom1=..],VisaId=..`
pub fn signature_base(payload: &SkipCashPayload) -> String {
    let mut pieces = vec![
        format!("PaymentId={}", payload.payment_id),
        format!("Amount={}", payload.amount),
        format!("StatusId={}", payload.status_id),
    ];
    if let Some(transaction_id) = payload.transaction_id.as_deref().filter(|v| !v.is_empty()) {
        pieces.push(format!("TransactionId={}", transaction_id));
    }
    if let Some(custom1) = payload.custom1.as_deref().filter(|v| !v.is_empty()) {
        pieces.push(format!("Custom1={}", custom1));
    }
    pieces.push(format!("VisaId={}", payload.visa_id));
    pieces.join(",")
}

pub fn sign(key: &str, payload: &SkipCashPayload) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    let tag = hmac::sign(&key, signature_base(payload).as_bytes());
    BASE64_STANDARD.encode(tag.as_ref())
}

pub fn verify(key: &str, payload: &SkipCashPayload, provided: &str) -> bool {
    let expected = sign(key, payload);
    expected.as_bytes().ct_eq(provided.trim().as_bytes()).into()
}
