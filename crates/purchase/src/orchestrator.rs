//! Purchase orchestrator.

use std::time::Instant;

use chrono::Utc;
use common::{ItemId, TransactionEvidenceId, UserId};
use domain::{
    CategoryLookup, Item, ListingDraft, MarketPolicy, NewItem, NewTransactionEvidence, NewUser, Price,
    Shipping, StaticCategories, TransactionEvidence, TransactionEvidenceStatus, User,
};
use market_store::{MarketStore, StoreError, StoreTx};

use crate::error::{PurchaseError, Result};
use crate::services::carrier::{Carrier, ShipmentAddresses};
use crate::services::payment::PaymentGateway;
use crate::view::{ItemDetail, ShipmentTicket, TransactionSummary};

/// The resolved session of the user making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    /// The anti-forgery token issued with the session.
    pub csrf_token: String,
}

impl Caller {
    pub fn new(user_id: UserId, csrf_token: impl Into<String>) -> Self {
        Self {
            user_id,
            csrf_token: csrf_token.into(),
        }
    }
}

/// Rows of one purchase, locked in item, evidence, shipping order.
struct LockedPurchase {
    item: Item,
    evidence: TransactionEvidence,
    shipping: Shipping,
}

/// Records the outcome and duration of one operation.
fn observe<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    };
    metrics::counter!(
        "purchase_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("purchase_operation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    if let Err(e) = result {
        tracing::debug!(operation, kind = %e.kind(), error = %e, "operation rejected");
    }
}

/// Commits on success and rolls back on failure.
async fn finish<T, Tx: StoreTx>(tx: Tx, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Locks the item, its evidence and its shipping, checking the states a
/// post-purchase step requires. `allowed` decides on the evidence status.
async fn lock_purchase<Tx: StoreTx>(
    tx: &mut Tx,
    item_id: ItemId,
    evidence_id: TransactionEvidenceId,
    allowed: fn(&TransactionEvidenceStatus) -> bool,
    action: &'static str,
) -> Result<LockedPurchase> {
    let item = tx
        .lock_item(item_id)
        .await?
        .ok_or(PurchaseError::NotFound("item"))?;
    if !item.status.is_trading() {
        return Err(PurchaseError::PreconditionFailed(format!(
            "item is {}, not trading",
            item.status
        )));
    }

    let evidence = tx
        .lock_transaction_evidence(evidence_id)
        .await?
        .ok_or(PurchaseError::NotFound("transaction evidence"))?;
    if !allowed(&evidence.status) {
        return Err(PurchaseError::PreconditionFailed(format!(
            "cannot {action} while transaction evidence is {}",
            evidence.status
        )));
    }

    let shipping = tx
        .lock_shipping(evidence_id)
        .await?
        .ok_or(PurchaseError::NotFound("shipping"))?;

    Ok(LockedPurchase {
        item,
        evidence,
        shipping,
    })
}

/// Drives items, purchase records and shipments through their lifecycle.
///
/// Every operation re-derives state from the store. Authorization uses an
/// unlocked read; the state decision is re-made on rows locked in one unit
/// of work, and external services are called while those locks are held.
pub struct PurchaseOrchestrator<S, P, C, K = StaticCategories>
where
    S: MarketStore,
    P: PaymentGateway,
    C: Carrier,
    K: CategoryLookup,
{
    store: S,
    payment: P,
    carrier: C,
    categories: K,
    policy: MarketPolicy,
}

impl<S, P, C> PurchaseOrchestrator<S, P, C, StaticCategories>
where
    S: MarketStore,
    P: PaymentGateway,
    C: Carrier,
{
    /// Creates an orchestrator over the built-in category table.
    pub fn new(store: S, payment: P, carrier: C) -> Self {
        Self::with_categories(store, payment, carrier, StaticCategories::new())
    }
}

impl<S, P, C, K> PurchaseOrchestrator<S, P, C, K>
where
    S: MarketStore,
    P: PaymentGateway,
    C: Carrier,
    K: CategoryLookup,
{
    pub fn with_categories(store: S, payment: P, carrier: C, categories: K) -> Self {
        Self {
            store,
            payment,
            carrier,
            categories,
            policy: MarketPolicy::default(),
        }
    }

    /// Replaces the marketplace rules.
    pub fn with_policy(mut self, policy: MarketPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn check_csrf(caller: &Caller, csrf_token: &str) -> Result<()> {
        if caller.csrf_token != csrf_token {
            return Err(PurchaseError::CsrfMismatch);
        }
        Ok(())
    }

    async fn load_user(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(PurchaseError::NotFound("user"))
    }

    async fn authorize(&self, caller: &Caller, csrf_token: &str) -> Result<User> {
        Self::check_csrf(caller, csrf_token)?;
        self.load_user(caller.user_id).await
    }

    async fn evidence_for_item(&self, item_id: ItemId) -> Result<TransactionEvidence> {
        self.store
            .find_transaction_evidence_by_item(item_id)
            .await?
            .ok_or(PurchaseError::NotFound("transaction evidence"))
    }

    /// Buys an on-sale item.
    ///
    /// Reserves a delivery and captures the payment while the item row is
    /// locked; nothing is committed unless both succeed. A reservation made
    /// before a failed capture is not cancelled.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id, item_id = %item_id))]
    pub async fn buy(
        &self,
        caller: &Caller,
        csrf_token: &str,
        item_id: ItemId,
        payment_token: &str,
    ) -> Result<TransactionEvidenceId> {
        let started = Instant::now();
        let result = async {
            let buyer = self.authorize(caller, csrf_token).await?;
            let mut tx = self.store.begin().await?;
            let result = self.buy_locked(&mut tx, &buyer, item_id, payment_token).await;
            finish(tx, result).await
        }
        .await;
        observe("buy", started, &result);
        result
    }

    async fn buy_locked(
        &self,
        tx: &mut S::Tx,
        buyer: &User,
        item_id: ItemId,
        payment_token: &str,
    ) -> Result<TransactionEvidenceId> {
        let now = Utc::now();

        let mut item = tx
            .lock_item(item_id)
            .await?
            .ok_or(PurchaseError::NotFound("item"))?;
        if !item.status.can_buy() {
            return Err(PurchaseError::PreconditionFailed(
                "item is not on sale".to_string(),
            ));
        }
        if item.seller_id == buyer.id {
            return Err(PurchaseError::Forbidden(
                "cannot buy your own item".to_string(),
            ));
        }

        let seller = tx
            .lock_user(item.seller_id)
            .await?
            .ok_or(PurchaseError::NotFound("seller"))?;
        let category = self
            .categories
            .category(item.category_id)
            .ok_or(PurchaseError::MissingCategory(item.category_id))?;

        let evidence = tx
            .insert_transaction_evidence(
                NewTransactionEvidence::for_purchase(&item, buyer.id, &category),
                now,
            )
            .await?;
        item.start_trading(buyer.id, now)?;
        tx.update_item(&item).await?;

        let reservation = self
            .carrier
            .reserve(&ShipmentAddresses::between(&seller, buyer))
            .await?;

        let status = match self.payment.capture(payment_token, item.price).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    reserve_id = %reservation.reserve_id,
                    error = %e,
                    "payment failed; carrier reservation left open"
                );
                return Err(e);
            }
        };
        if !status.is_ok() {
            tracing::warn!(
                reserve_id = %reservation.reserve_id,
                status = %status,
                "payment rejected; carrier reservation left open"
            );
            return Err(PurchaseError::PaymentRejected(status));
        }

        let shipping = Shipping::reserved(evidence.id, &item, reservation, buyer, &seller, now);
        tx.insert_shipping(&shipping).await?;

        tracing::info!(
            transaction_evidence_id = %evidence.id,
            reserve_id = %shipping.reserve_id,
            "item bought"
        );
        Ok(evidence.id)
    }

    /// Issues the shipping label for a bought item. Seller only.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id, item_id = %item_id))]
    pub async fn request_shipment(
        &self,
        caller: &Caller,
        csrf_token: &str,
        item_id: ItemId,
    ) -> Result<ShipmentTicket> {
        let started = Instant::now();
        let result = async {
            let seller = self.authorize(caller, csrf_token).await?;
            let evidence = self.evidence_for_item(item_id).await?;
            if evidence.seller_id != seller.id {
                return Err(PurchaseError::Forbidden(
                    "only the seller can request shipment".to_string(),
                ));
            }

            let mut tx = self.store.begin().await?;
            let result = self
                .request_shipment_locked(&mut tx, item_id, evidence.id)
                .await;
            finish(tx, result).await
        }
        .await;
        observe("ship", started, &result);
        result
    }

    async fn request_shipment_locked(
        &self,
        tx: &mut S::Tx,
        item_id: ItemId,
        evidence_id: TransactionEvidenceId,
    ) -> Result<ShipmentTicket> {
        let LockedPurchase {
            evidence,
            mut shipping,
            ..
        } = lock_purchase(
            tx,
            item_id,
            evidence_id,
            TransactionEvidenceStatus::can_request_shipment,
            "request shipment",
        )
        .await?;

        let label = self.carrier.fetch_label(&shipping.reserve_id).await?;
        shipping.attach_label(label, Utc::now())?;
        tx.update_shipping(&shipping).await?;

        tracing::info!(
            transaction_evidence_id = %evidence.id,
            reserve_id = %shipping.reserve_id,
            "shipping label issued"
        );
        Ok(ShipmentTicket {
            path: evidence.label_path(),
            reserve_id: shipping.reserve_id,
        })
    }

    /// Confirms the carrier has picked the parcel up. Seller only.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id, item_id = %item_id))]
    pub async fn confirm_handoff(
        &self,
        caller: &Caller,
        csrf_token: &str,
        item_id: ItemId,
    ) -> Result<TransactionEvidenceId> {
        let started = Instant::now();
        let result = async {
            let seller = self.authorize(caller, csrf_token).await?;
            let evidence = self.evidence_for_item(item_id).await?;
            if evidence.seller_id != seller.id {
                return Err(PurchaseError::Forbidden(
                    "only the seller can confirm shipment".to_string(),
                ));
            }

            let mut tx = self.store.begin().await?;
            let result = self
                .confirm_handoff_locked(&mut tx, item_id, evidence.id)
                .await;
            finish(tx, result).await
        }
        .await;
        observe("ship_done", started, &result);
        result
    }

    async fn confirm_handoff_locked(
        &self,
        tx: &mut S::Tx,
        item_id: ItemId,
        evidence_id: TransactionEvidenceId,
    ) -> Result<TransactionEvidenceId> {
        let LockedPurchase {
            mut evidence,
            mut shipping,
            ..
        } = lock_purchase(
            tx,
            item_id,
            evidence_id,
            TransactionEvidenceStatus::can_confirm_handoff,
            "confirm shipment",
        )
        .await?;
        if !shipping.status.awaits_pickup() {
            return Err(PurchaseError::PreconditionFailed(format!(
                "shipment not requested yet; shipping is {}",
                shipping.status
            )));
        }

        let status = self.carrier.poll_status(&shipping.reserve_id).await?;
        if !status.is_handed_off() {
            return Err(PurchaseError::PreconditionFailed(format!(
                "carrier reports {status}; parcel not shipped yet"
            )));
        }

        let now = Utc::now();
        shipping.record_carrier_status(status, now);
        evidence.mark_handed_off(now)?;
        tx.update_shipping(&shipping).await?;
        tx.update_transaction_evidence(&evidence).await?;

        tracing::info!(
            transaction_evidence_id = %evidence.id,
            shipping_status = %status,
            "shipment handed off"
        );
        Ok(evidence.id)
    }

    /// Confirms receipt and finalizes the item. Buyer only.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id, item_id = %item_id))]
    pub async fn confirm_receipt(
        &self,
        caller: &Caller,
        csrf_token: &str,
        item_id: ItemId,
    ) -> Result<TransactionEvidenceId> {
        let started = Instant::now();
        let result = async {
            let buyer = self.authorize(caller, csrf_token).await?;
            let evidence = self.evidence_for_item(item_id).await?;
            if evidence.buyer_id != buyer.id {
                return Err(PurchaseError::Forbidden(
                    "only the buyer can complete the transaction".to_string(),
                ));
            }

            let mut tx = self.store.begin().await?;
            let result = self
                .confirm_receipt_locked(&mut tx, item_id, evidence.id)
                .await;
            finish(tx, result).await
        }
        .await;
        observe("complete", started, &result);
        result
    }

    async fn confirm_receipt_locked(
        &self,
        tx: &mut S::Tx,
        item_id: ItemId,
        evidence_id: TransactionEvidenceId,
    ) -> Result<TransactionEvidenceId> {
        let LockedPurchase {
            mut item,
            mut evidence,
            mut shipping,
        } = lock_purchase(
            tx,
            item_id,
            evidence_id,
            TransactionEvidenceStatus::can_confirm_receipt,
            "complete",
        )
        .await?;

        let status = self.carrier.poll_status(&shipping.reserve_id).await?;
        if !status.is_delivered() {
            return Err(PurchaseError::PreconditionFailed(format!(
                "carrier reports {status}; parcel not delivered yet"
            )));
        }

        let now = Utc::now();
        shipping.record_carrier_status(status, now);
        evidence.mark_done(now)?;
        item.mark_sold_out(now)?;
        tx.update_shipping(&shipping).await?;
        tx.update_transaction_evidence(&evidence).await?;
        tx.update_item(&item).await?;

        tracing::info!(transaction_evidence_id = %evidence.id, "transaction completed");
        Ok(evidence.id)
    }

    /// Changes the price of an on-sale item. Seller only.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id, item_id = %item_id))]
    pub async fn edit_price(
        &self,
        caller: &Caller,
        csrf_token: &str,
        item_id: ItemId,
        price: i64,
    ) -> Result<Item> {
        let started = Instant::now();
        let result = async {
            Self::check_csrf(caller, csrf_token)?;
            let price = Price::new(price)?;
            let seller = self.load_user(caller.user_id).await?;

            let item = self
                .store
                .get_item(item_id)
                .await?
                .ok_or(PurchaseError::NotFound("item"))?;
            if item.seller_id != seller.id {
                return Err(PurchaseError::Forbidden(
                    "only the seller can edit the price".to_string(),
                ));
            }

            let mut tx = self.store.begin().await?;
            let result = Self::edit_price_locked(&mut tx, item_id, price).await;
            finish(tx, result).await
        }
        .await;
        observe("edit", started, &result);
        result
    }

    async fn edit_price_locked(tx: &mut S::Tx, item_id: ItemId, price: Price) -> Result<Item> {
        let mut item = tx
            .lock_item(item_id)
            .await?
            .ok_or(PurchaseError::NotFound("item"))?;
        if !item.status.can_edit_price() {
            return Err(PurchaseError::PreconditionFailed(
                "item is not on sale".to_string(),
            ));
        }

        item.change_price(price, Utc::now())?;
        tx.update_item(&item).await?;

        tracing::info!(price = %price, "price changed");
        Ok(item)
    }

    /// Moves an item to the front of the listing order. Seller only, rate
    /// limited per seller.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id, item_id = %item_id))]
    pub async fn bump(&self, caller: &Caller, csrf_token: &str, item_id: ItemId) -> Result<Item> {
        let started = Instant::now();
        let result = async {
            let user = self.authorize(caller, csrf_token).await?;
            let mut tx = self.store.begin().await?;
            let result = self.bump_locked(&mut tx, user.id, item_id).await;
            finish(tx, result).await
        }
        .await;
        observe("bump", started, &result);
        result
    }

    async fn bump_locked(&self, tx: &mut S::Tx, user_id: UserId, item_id: ItemId) -> Result<Item> {
        let mut item = tx
            .lock_item(item_id)
            .await?
            .ok_or(PurchaseError::NotFound("item"))?;
        if item.seller_id != user_id {
            return Err(PurchaseError::Forbidden(
                "only the seller can bump the item".to_string(),
            ));
        }

        let mut seller = tx
            .lock_user(user_id)
            .await?
            .ok_or(PurchaseError::NotFound("user"))?;
        let now = Utc::now();
        if !self.policy.bump_allowed(seller.last_bump, now) {
            return Err(PurchaseError::PreconditionFailed(
                "bump not allowed yet".to_string(),
            ));
        }

        item.bump(now);
        seller.record_bump(now);
        tx.update_item(&item).await?;
        tx.update_user(&seller).await?;

        tracing::info!("item bumped");
        Ok(item)
    }

    /// Lists a new item for sale.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
    pub async fn sell(&self, caller: &Caller, csrf_token: &str, draft: ListingDraft) -> Result<Item> {
        let started = Instant::now();
        let result = async {
            Self::check_csrf(caller, csrf_token)?;
            let listing = draft.validate(caller.user_id, &self.categories)?;

            let mut tx = self.store.begin().await?;
            let result = Self::sell_locked(&mut tx, caller.user_id, listing).await;
            finish(tx, result).await
        }
        .await;
        observe("sell", started, &result);
        result
    }

    async fn sell_locked(tx: &mut S::Tx, seller_id: UserId, listing: NewItem) -> Result<Item> {
        let mut seller = tx
            .lock_user(seller_id)
            .await?
            .ok_or(PurchaseError::NotFound("user"))?;
        let now = Utc::now();
        let item = tx.insert_item(listing, now).await?;
        seller.record_listing(now);
        tx.update_user(&seller).await?;

        tracing::info!(item_id = %item.id, "item listed");
        Ok(item)
    }

    /// Returns the stored label image of a shipment. Seller only.
    #[tracing::instrument(skip(self))]
    pub async fn shipment_label(
        &self,
        user_id: UserId,
        evidence_id: TransactionEvidenceId,
    ) -> Result<Vec<u8>> {
        let seller = self.load_user(user_id).await?;
        let evidence = self
            .store
            .get_transaction_evidence(evidence_id)
            .await?
            .ok_or(PurchaseError::NotFound("transaction evidence"))?;
        if evidence.seller_id != seller.id {
            return Err(PurchaseError::Forbidden(
                "only the seller can fetch the label".to_string(),
            ));
        }

        let shipping = self
            .store
            .get_shipping(evidence_id)
            .await?
            .ok_or(PurchaseError::NotFound("shipping"))?;
        shipping
            .current_label()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                PurchaseError::PreconditionFailed(format!(
                    "no label while shipping is {}",
                    shipping.status
                ))
            })
    }

    /// Returns an item as its detail page shows it to `viewer`.
    ///
    /// Purchase progress and the buyer are included only for the seller and
    /// the buyer.
    #[tracing::instrument(skip(self))]
    pub async fn item_detail(&self, viewer: UserId, item_id: ItemId) -> Result<ItemDetail> {
        let viewer = self.load_user(viewer).await?;
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or(PurchaseError::NotFound("item"))?;
        let category = self
            .categories
            .category(item.category_id)
            .ok_or(PurchaseError::MissingCategory(item.category_id))?;
        let seller = self
            .store
            .get_user(item.seller_id)
            .await?
            .ok_or(PurchaseError::NotFound("seller"))?;

        let (buyer, transaction) = match item.buyer_id {
            Some(buyer_id) if item.is_party(viewer.id) => {
                let buyer = self
                    .store
                    .get_user(buyer_id)
                    .await?
                    .ok_or(PurchaseError::NotFound("buyer"))?;
                let evidence = self.evidence_for_item(item.id).await?;
                let shipping = self
                    .store
                    .get_shipping(evidence.id)
                    .await?
                    .ok_or(PurchaseError::NotFound("shipping"))?;
                let summary = TransactionSummary {
                    transaction_evidence_id: evidence.id,
                    transaction_evidence_status: evidence.status,
                    shipping_status: shipping.status,
                };
                (Some(buyer), Some(summary))
            }
            _ => (None, None),
        };

        Ok(ItemDetail::new(
            &item,
            category,
            &seller,
            buyer.as_ref(),
            transaction,
        ))
    }

    /// Registers a user.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, account_name: &str, address: &str) -> Result<User> {
        let new_user = NewUser::new(account_name, address)?;
        let user = self
            .store
            .insert_user(new_user, Utc::now())
            .await
            .map_err(|e| match e {
                StoreError::Conflict(message) => PurchaseError::InvalidInput(message),
                other => PurchaseError::Store(other),
            })?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }
}
