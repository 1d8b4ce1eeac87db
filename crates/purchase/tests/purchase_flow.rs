//! End-to-end purchase lifecycle against the in-memory store and fakes.

use chrono::TimeDelta;
use common::{CategoryId, ItemId};
use domain::{
    Item, ItemStatus, ListingDraft, MarketPolicy, ShippingStatus, TransactionEvidenceStatus,
};
use market_store::{InMemoryMarketStore, MarketStore};
use purchase::{
    Caller, ErrorKind, InMemoryCarrier, InMemoryPaymentGateway, PaymentStatus, PurchaseError,
    PurchaseOrchestrator,
};

type Orchestrator = PurchaseOrchestrator<InMemoryMarketStore, InMemoryPaymentGateway, InMemoryCarrier>;

const SELLER_CSRF: &str = "csrf-seller";
const BUYER_CSRF: &str = "csrf-buyer";
const OTHER_CSRF: &str = "csrf-other";

struct Fixture {
    orchestrator: Orchestrator,
    store: InMemoryMarketStore,
    payment: InMemoryPaymentGateway,
    carrier: InMemoryCarrier,
    seller: Caller,
    buyer: Caller,
    other: Caller,
    item: Item,
}

fn draft(price: i64) -> ListingDraft {
    ListingDraft {
        name: "office chair".to_string(),
        description: "barely used".to_string(),
        price,
        category_id: CategoryId::new(31),
        image_name: "chair.jpg".to_string(),
    }
}

async fn setup_with_policy(policy: MarketPolicy) -> Fixture {
    let store = InMemoryMarketStore::new();
    let payment = InMemoryPaymentGateway::new();
    let carrier = InMemoryCarrier::new();
    let orchestrator = PurchaseOrchestrator::new(store.clone(), payment.clone(), carrier.clone())
        .with_policy(policy);

    let seller = orchestrator.register("seller", "1 Elm St").await.unwrap();
    let buyer = orchestrator.register("buyer", "2 Oak Ave").await.unwrap();
    let other = orchestrator.register("other", "3 Pine Rd").await.unwrap();

    let seller = Caller::new(seller.id, SELLER_CSRF);
    let buyer = Caller::new(buyer.id, BUYER_CSRF);
    let other = Caller::new(other.id, OTHER_CSRF);

    let item = orchestrator
        .sell(&seller, SELLER_CSRF, draft(500))
        .await
        .unwrap();

    Fixture {
        orchestrator,
        store,
        payment,
        carrier,
        seller,
        buyer,
        other,
        item,
    }
}

async fn setup() -> Fixture {
    setup_with_policy(MarketPolicy::default()).await
}

impl Fixture {
    async fn buy(&self) -> Result<common::TransactionEvidenceId, PurchaseError> {
        self.orchestrator
            .buy(&self.buyer, BUYER_CSRF, self.item.id, "tok")
            .await
    }

    async fn ship(&self) -> Result<purchase::ShipmentTicket, PurchaseError> {
        self.orchestrator
            .request_shipment(&self.seller, SELLER_CSRF, self.item.id)
            .await
    }

    async fn ship_done(&self) -> Result<common::TransactionEvidenceId, PurchaseError> {
        self.orchestrator
            .confirm_handoff(&self.seller, SELLER_CSRF, self.item.id)
            .await
    }

    async fn complete(&self) -> Result<common::TransactionEvidenceId, PurchaseError> {
        self.orchestrator
            .confirm_receipt(&self.buyer, BUYER_CSRF, self.item.id)
            .await
    }

    async fn item(&self) -> Item {
        self.store.get_item(self.item.id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_buy_moves_item_to_trading() {
    let f = setup().await;

    let te_id = f.buy().await.unwrap();

    let item = f.item().await;
    assert_eq!(item.status, ItemStatus::Trading);
    assert_eq!(item.buyer_id, Some(f.buyer.user_id));

    let te = f
        .store
        .get_transaction_evidence(te_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(te.status, TransactionEvidenceStatus::WaitShipping);
    assert_eq!(te.item_id, f.item.id);
    assert_eq!(te.seller_id, f.seller.user_id);
    assert_eq!(te.buyer_id, f.buyer.user_id);
    assert_eq!(te.item.price().get(), 500);
    assert_eq!(te.item.root_category_id(), CategoryId::new(30));

    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Initial);
    assert_eq!(shipping.reserve_id, "R1");
    assert_eq!(shipping.to_name, "buyer");
    assert_eq!(shipping.from_address, "1 Elm St");
    assert!(shipping.label.is_empty());

    assert_eq!(f.payment.captures(), vec![("tok".to_string(), item.price)]);
}

#[tokio::test]
async fn test_declined_payment_rolls_everything_back() {
    let f = setup().await;
    f.payment.set_outcome(PaymentStatus::Fail);

    let err = f.buy().await.unwrap_err();
    assert!(matches!(err, PurchaseError::PaymentRejected(PaymentStatus::Fail)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let item = f.item().await;
    assert_eq!(item.status, ItemStatus::OnSale);
    assert_eq!(item.buyer_id, None);
    assert_eq!(f.store.transaction_evidence_count().await, 0);
    assert_eq!(f.store.shipping_count().await, 0);

    // The carrier reservation is not cancelled.
    assert_eq!(f.carrier.reservation_count(), 1);
}

#[tokio::test]
async fn test_payment_outage_is_external_failure() {
    let f = setup().await;
    f.payment.set_fail_on_capture(true);

    let err = f.buy().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(f.item().await.status, ItemStatus::OnSale);
    assert_eq!(f.store.transaction_evidence_count().await, 0);
}

#[tokio::test]
async fn test_carrier_outage_aborts_buy_before_payment() {
    let f = setup().await;
    f.carrier.set_fail_on_reserve(true);

    let err = f.buy().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(f.payment.capture_count(), 0);
    assert_eq!(f.item().await.status, ItemStatus::OnSale);
}

#[tokio::test]
async fn test_seller_cannot_buy_own_item() {
    let f = setup().await;

    let err = f
        .orchestrator
        .buy(&f.seller, SELLER_CSRF, f.item.id, "tok")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(f.carrier.reservation_count(), 0);
}

#[tokio::test]
async fn test_buy_with_wrong_csrf_token() {
    let f = setup().await;

    let err = f
        .orchestrator
        .buy(&f.buyer, "forged", f.item.id, "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, PurchaseError::CsrfMismatch));
    assert_eq!(f.item().await.status, ItemStatus::OnSale);
}

#[tokio::test]
async fn test_buy_unknown_item() {
    let f = setup().await;

    let err = f
        .orchestrator
        .buy(&f.buyer, BUYER_CSRF, ItemId::new(999), "tok")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_second_buy_sees_trading_item() {
    let f = setup().await;
    f.buy().await.unwrap();

    let err = f
        .orchestrator
        .buy(&f.other, OTHER_CSRF, f.item.id, "tok2")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(f.item().await.buyer_id, Some(f.buyer.user_id));
    assert_eq!(f.payment.capture_count(), 1);
}

#[tokio::test]
async fn test_full_lifecycle_ends_sold_out() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();

    let ticket = f.ship().await.unwrap();
    assert_eq!(ticket.path, format!("/transactions/{te_id}.png"));
    assert_eq!(ticket.reserve_id, "R1");

    let label = f
        .orchestrator
        .shipment_label(f.seller.user_id, te_id)
        .await
        .unwrap();
    assert!(!label.is_empty());

    f.carrier.set_status("R1", ShippingStatus::Shipping);
    assert_eq!(f.ship_done().await.unwrap(), te_id);

    let te = f.store.get_transaction_evidence(te_id).await.unwrap().unwrap();
    assert_eq!(te.status, TransactionEvidenceStatus::WaitDone);
    assert_eq!(f.item().await.status, ItemStatus::Trading);

    f.carrier.set_status("R1", ShippingStatus::Done);
    assert_eq!(f.complete().await.unwrap(), te_id);

    assert_eq!(f.item().await.status, ItemStatus::SoldOut);
    let te = f.store.get_transaction_evidence(te_id).await.unwrap().unwrap();
    assert_eq!(te.status, TransactionEvidenceStatus::Done);
    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Done);
    assert!(shipping.label.is_empty());

    let err = f
        .orchestrator
        .shipment_label(f.seller.user_id, te_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn test_ship_requires_prior_buy() {
    let f = setup().await;

    let err = f.ship().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_only_seller_can_ship() {
    let f = setup().await;
    f.buy().await.unwrap();

    let err = f
        .orchestrator
        .request_shipment(&f.buyer, BUYER_CSRF, f.item.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_ship_after_handoff_is_rejected_without_writes() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.ship().await.unwrap();
    f.carrier.set_status("R1", ShippingStatus::Shipping);
    f.ship_done().await.unwrap();
    let before = f.store.get_shipping(te_id).await.unwrap().unwrap();

    let err = f.ship().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(f.store.get_shipping(te_id).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_repeat_ship_reissues_label() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.ship().await.unwrap();

    f.ship().await.unwrap();
    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::WaitPickup);
}

#[tokio::test]
async fn test_label_outage_leaves_shipping_initial() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.carrier.set_fail_on_label(true);

    let err = f.ship().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);

    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Initial);
    assert!(shipping.label.is_empty());
}

#[tokio::test]
async fn test_ship_done_before_pickup_is_rejected() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.ship().await.unwrap();

    let err = f.ship_done().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let te = f.store.get_transaction_evidence(te_id).await.unwrap().unwrap();
    assert_eq!(te.status, TransactionEvidenceStatus::WaitShipping);
    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::WaitPickup);
}

#[tokio::test]
async fn test_ship_done_without_label_is_rejected_without_writes() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.carrier.set_status("R1", ShippingStatus::Shipping);

    let err = f.ship_done().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let te = f.store.get_transaction_evidence(te_id).await.unwrap().unwrap();
    assert_eq!(te.status, TransactionEvidenceStatus::WaitShipping);
    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Initial);
    assert!(shipping.label.is_empty());
}

#[tokio::test]
async fn test_ship_done_accepts_delivered_parcel() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.ship().await.unwrap();
    f.carrier.set_status("R1", ShippingStatus::Done);

    f.ship_done().await.unwrap();
    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Done);
}

#[tokio::test]
async fn test_complete_while_in_transit_changes_nothing() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.ship().await.unwrap();
    f.carrier.set_status("R1", ShippingStatus::Shipping);
    f.ship_done().await.unwrap();

    let err = f.complete().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let te = f.store.get_transaction_evidence(te_id).await.unwrap().unwrap();
    assert_eq!(te.status, TransactionEvidenceStatus::WaitDone);
    let shipping = f.store.get_shipping(te_id).await.unwrap().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Shipping);
    assert_eq!(f.item().await.status, ItemStatus::Trading);
}

#[tokio::test]
async fn test_complete_replay_is_rejected() {
    let f = setup().await;
    f.buy().await.unwrap();
    f.ship().await.unwrap();
    f.carrier.set_status("R1", ShippingStatus::Done);
    f.ship_done().await.unwrap();
    f.complete().await.unwrap();

    let err = f.complete().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(f.item().await.status, ItemStatus::SoldOut);
}

#[tokio::test]
async fn test_only_buyer_can_complete() {
    let f = setup().await;
    f.buy().await.unwrap();

    let err = f
        .orchestrator
        .confirm_receipt(&f.seller, SELLER_CSRF, f.item.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_edit_price() {
    let f = setup().await;

    let item = f
        .orchestrator
        .edit_price(&f.seller, SELLER_CSRF, f.item.id, 800)
        .await
        .unwrap();
    assert_eq!(item.price.get(), 800);
    assert_eq!(f.item().await.price.get(), 800);
}

#[tokio::test]
async fn test_edit_price_bounds_checked_before_storage() {
    let f = setup().await;

    for price in [99, 1_000_001] {
        let err = f
            .orchestrator
            .edit_price(&f.seller, SELLER_CSRF, ItemId::new(999), price)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

#[tokio::test]
async fn test_edit_price_rejected_after_purchase() {
    let f = setup().await;
    f.buy().await.unwrap();

    let err = f
        .orchestrator
        .edit_price(&f.seller, SELLER_CSRF, f.item.id, 800)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(f.item().await.price.get(), 500);
}

#[tokio::test]
async fn test_edit_price_by_non_seller() {
    let f = setup().await;

    let err = f
        .orchestrator
        .edit_price(&f.other, OTHER_CSRF, f.item.id, 800)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_bump_rate_limited_after_listing() {
    let f = setup().await;

    let err = f
        .orchestrator
        .bump(&f.seller, SELLER_CSRF, f.item.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn test_bump_refreshes_listing_time() {
    let f = setup_with_policy(MarketPolicy::with_bump_interval(TimeDelta::zero())).await;

    let bumped = f
        .orchestrator
        .bump(&f.seller, SELLER_CSRF, f.item.id)
        .await
        .unwrap();
    assert!(bumped.created_at >= f.item.created_at);
    assert_eq!(bumped.created_at, bumped.updated_at);

    let seller = f.store.get_user(f.seller.user_id).await.unwrap().unwrap();
    assert_eq!(seller.last_bump, bumped.created_at);
}

#[tokio::test]
async fn test_bump_by_non_seller() {
    let f = setup_with_policy(MarketPolicy::with_bump_interval(TimeDelta::zero())).await;

    let err = f
        .orchestrator
        .bump(&f.other, OTHER_CSRF, f.item.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_sell_counts_listings() {
    let f = setup().await;

    let seller = f.store.get_user(f.seller.user_id).await.unwrap().unwrap();
    assert_eq!(seller.num_sell_items, 1);
    assert_eq!(f.item.status, ItemStatus::OnSale);
    assert_eq!(f.item.buyer_id, None);
}

#[tokio::test]
async fn test_sell_rejects_root_category() {
    let f = setup().await;
    let mut listing = draft(500);
    listing.category_id = CategoryId::new(30);

    let err = f
        .orchestrator
        .sell(&f.seller, SELLER_CSRF, listing)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(f.store.item_count().await, 1);
}

#[tokio::test]
async fn test_item_detail_shows_progress_to_parties_only() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();

    let detail = f
        .orchestrator
        .item_detail(f.buyer.user_id, f.item.id)
        .await
        .unwrap();
    let transaction = detail.transaction.unwrap();
    assert_eq!(transaction.transaction_evidence_id, te_id);
    assert_eq!(
        transaction.transaction_evidence_status,
        TransactionEvidenceStatus::WaitShipping
    );
    assert_eq!(transaction.shipping_status, ShippingStatus::Initial);
    assert_eq!(detail.buyer.unwrap().id, f.buyer.user_id);
    assert_eq!(detail.category.parent_category_name.as_deref(), Some("Office chairs"));

    let detail = f
        .orchestrator
        .item_detail(f.other.user_id, f.item.id)
        .await
        .unwrap();
    assert!(detail.transaction.is_none());
    assert!(detail.buyer.is_none());
    assert_eq!(detail.seller.id, f.seller.user_id);
}

#[tokio::test]
async fn test_label_only_for_seller() {
    let f = setup().await;
    let te_id = f.buy().await.unwrap();
    f.ship().await.unwrap();

    let err = f
        .orchestrator
        .shipment_label(f.buyer.user_id, te_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_duplicate_registration_is_invalid_input() {
    let f = setup().await;

    let err = f
        .orchestrator
        .register("seller", "elsewhere")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
