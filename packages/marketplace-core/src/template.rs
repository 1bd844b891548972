//! Unsigned transaction templates.
//!
//! Templates are descriptions for an external, untrusted signer. The
//! `instructions` block carries the fields the signer must fill in
//! (sequence, last ledger) before signing.

use crate::model::{Listing, TxKind};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct UnsignedTransaction {
    pub transaction_type: &'static str,
    pub template: Value,
    pub instructions: Value,
}

fn instructions() -> Value {
    json!({
        "fee": "10",
        "sequence": null,
        "last_ledger_sequence": null,
    })
}

/// Sell-offer template for a pending listing. Flags=1 marks a sell offer.
pub fn sell_offer(listing: &Listing) -> UnsignedTransaction {
    UnsignedTransaction {
        transaction_type: TxKind::SellOffer.wire_name(),
        template: json!({
            "TransactionType": TxKind::SellOffer.wire_name(),
            "Account": listing.seller,
            "NFTokenID": listing.asset_id,
            "Amount": listing.price_drops.to_string(),
            "Flags": 1,
        }),
        instructions: instructions(),
    }
}

/// Accept-offer template for a buyer purchasing an active listing.
pub fn accept_offer(listing: &Listing, buyer: &str) -> UnsignedTransaction {
    UnsignedTransaction {
        transaction_type: TxKind::AcceptOffer.wire_name(),
        template: json!({
            "TransactionType": TxKind::AcceptOffer.wire_name(),
            "Account": buyer,
            "NFTokenID": listing.asset_id,
            "NFTokenSellOffer": listing.offer_id,
            "Amount": listing.price_drops.to_string(),
        }),
        instructions: instructions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fingerprint_of;
    use serde_json::json;

    fn listing() -> Listing {
        let mut l = Listing::new(
            "000A1".into(),
            "rSeller".into(),
            100,
            fingerprint_of(&json!({"name": "x"})),
        );
        l.offer_id = Some("OFFER-1".into());
        l
    }

    #[test]
    fn sell_offer_carries_listing_fields() {
        let tx = sell_offer(&listing());
        assert_eq!(tx.transaction_type, "NFTokenCreateOffer");
        assert_eq!(tx.template["Account"], "rSeller");
        assert_eq!(tx.template["NFTokenID"], "000A1");
        assert_eq!(tx.template["Amount"], "100");
        assert_eq!(tx.template["Flags"], 1);
        assert!(tx.instructions["sequence"].is_null());
    }

    #[test]
    fn accept_offer_references_ledger_offer() {
        let tx = accept_offer(&listing(), "rBuyer");
        assert_eq!(tx.transaction_type, "NFTokenAcceptOffer");
        assert_eq!(tx.template["Account"], "rBuyer");
        assert_eq!(tx.template["NFTokenSellOffer"], "OFFER-1");
        assert_eq!(tx.template["Amount"], "100");
    }
}
