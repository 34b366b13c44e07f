//! Unified order intake: tiered extraction, parse sessions, the
//! clarification loop, and turning accepted sessions into orders.
//!
//! Parsing never errors to the caller; extraction tiers fall through
//! primary LLM -> fallback LLM -> rule-based parser, and whichever tier
//! produced the result is recorded on the session.

use crate::application::messaging;
use crate::application::order_service::{OrderService, PlaceOrderOutcome};
use crate::application::routing_service::RoutingService;
use crate::domain::order::{LineItem, NewOrder};
use crate::domain::parser::{
    summarize_items, ClarificationAnswer, ExtractionTier, ParseDecision, ParseDraft, ParseEngine,
    ParseResult, ParseSession, SessionStatus,
};
use crate::domain::ports::{ExtractedItem, LlmExtractor, ObjectStore, OcrProvider};
use crate::domain::records::{UploadStatus, UploadedOrder};
use crate::domain::repositories::{
    ParseSessionRepository, ProductRepository, RetailerRepository, UploadedOrderRepository,
};
use crate::domain::types::{InputSource, RetailerId, VendorId};
use crate::domain::workflow::request_hash;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::queue::{JobFabric, JobPayload};
use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub struct OrderIntakeService {
    engine: ParseEngine,
    products: Arc<dyn ProductRepository>,
    sessions: Arc<dyn ParseSessionRepository>,
    retailers: Arc<dyn RetailerRepository>,
    uploads: Arc<dyn UploadedOrderRepository>,
    primary_llm: Option<Arc<dyn LlmExtractor>>,
    fallback_llm: Option<Arc<dyn LlmExtractor>>,
    ocr: Arc<dyn OcrProvider>,
    object_store: Arc<dyn ObjectStore>,
    routing: Arc<RoutingService>,
    orders: Arc<OrderService>,
    fabric: Arc<JobFabric>,
    metrics: Metrics,
}

impl OrderIntakeService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: ParseEngine,
        products: Arc<dyn ProductRepository>,
        sessions: Arc<dyn ParseSessionRepository>,
        retailers: Arc<dyn RetailerRepository>,
        uploads: Arc<dyn UploadedOrderRepository>,
        primary_llm: Option<Arc<dyn LlmExtractor>>,
        fallback_llm: Option<Arc<dyn LlmExtractor>>,
        ocr: Arc<dyn OcrProvider>,
        object_store: Arc<dyn ObjectStore>,
        routing: Arc<RoutingService>,
        orders: Arc<OrderService>,
        fabric: Arc<JobFabric>,
        metrics: Metrics,
    ) -> Self {
        Self {
            engine,
            products,
            sessions,
            retailers,
            uploads,
            primary_llm,
            fallback_llm,
            ocr,
            object_store,
            routing,
            orders,
            fabric,
            metrics,
        }
    }

    /// The public Parse contract: always returns a ParseResult.
    pub async fn parse(
        &self,
        source: InputSource,
        raw_input: &str,
        retailer_id: RetailerId,
    ) -> Result<ParseResult> {
        let products = self.products.list_all().await?;
        let (draft, tier) = self.extract_tiered(raw_input, &products).await;

        let mut session = ParseSession::new(retailer_id, source, raw_input.to_string(), tier);
        session.items = draft.items.clone();
        session.clarifications = draft.clarifications.clone();
        session.confidence = draft.overall_confidence();
        session.needs_clarification = !draft.clarifications.is_empty();
        session.status = match draft.decision(self.engine.config()) {
            ParseDecision::Proceed => SessionStatus::Open,
            ParseDecision::NeedsReview => SessionStatus::AwaitingClarification,
            ParseDecision::Reject => SessionStatus::Rejected,
        };
        self.sessions.insert(&session).await?;

        let decision_label = match draft.decision(self.engine.config()) {
            ParseDecision::Proceed => "proceed",
            ParseDecision::NeedsReview => "review",
            ParseDecision::Reject => "reject",
        };
        self.metrics
            .parse_outcomes_total
            .with_label_values(&[decision_label])
            .inc();
        info!(
            session_id = %session.id,
            %source,
            tier = %tier,
            confidence = session.confidence,
            decision = decision_label,
            "Parsed order input"
        );

        Ok(build_result(&session))
    }

    /// The tier ladder. A tier that errors or yields nothing falls
    /// through to the next.
    async fn extract_tiered(
        &self,
        raw_input: &str,
        products: &[crate::domain::catalog::Product],
    ) -> (ParseDraft, ExtractionTier) {
        for (extractor, tier) in [
            (&self.primary_llm, ExtractionTier::PrimaryLlm),
            (&self.fallback_llm, ExtractionTier::FallbackLlm),
        ] {
            let Some(extractor) = extractor else { continue };
            match extractor.extract_items(raw_input).await {
                Ok(items) if !items.is_empty() => {
                    let text = render_extracted(&items);
                    let draft = self.engine.parse(&text, products);
                    if !draft.items.is_empty() {
                        return (draft, tier);
                    }
                }
                Ok(_) => warn!(tier = %tier, "Extractor returned no items, falling through"),
                Err(e) => warn!(tier = %tier, "Extractor failed, falling through: {:#}", e),
            }
        }
        (self.engine.parse(raw_input, products), ExtractionTier::RuleBased)
    }

    /// Resumes a session with the buyer's answers.
    pub async fn clarify(
        &self,
        session_id: Uuid,
        answers: &[ClarificationAnswer],
    ) -> Result<ParseResult> {
        let mut session = self
            .sessions
            .find(session_id)
            .await?
            .with_context(|| format!("Parse session {} not found", session_id))?;
        session
            .ensure_resumable(Utc::now())
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        let products = self.products.list_all().await?;
        let mut draft = ParseDraft {
            items: session.items.clone(),
            clarifications: session.clarifications.clone(),
        };
        self.engine.apply_answers(&mut draft, answers, &products);

        session.items = draft.items.clone();
        session.clarifications = draft.clarifications.clone();
        session.confidence = draft.overall_confidence();
        session.needs_clarification = !draft.clarifications.is_empty();
        session.status = match draft.decision(self.engine.config()) {
            ParseDecision::Proceed => SessionStatus::Open,
            ParseDecision::NeedsReview => SessionStatus::AwaitingClarification,
            ParseDecision::Reject => SessionStatus::Rejected,
        };
        self.sessions.save(&session).await?;

        Ok(build_result(&session))
    }

    /// Full inbound flow for a text-like order: parse, then either place
    /// orders, ask the clarifying questions, or send the retry message.
    pub async fn handle_inbound(
        &self,
        source: InputSource,
        raw_input: &str,
        retailer_id: RetailerId,
    ) -> Result<ParseResult> {
        let result = self.parse(source, raw_input, retailer_id).await?;
        let retailer = self.retailers.find(retailer_id).await?;
        let phone = retailer.as_ref().map(|r| r.phone.clone());

        if !result.needs_clarification && result.overall_confidence >= self.engine.config().auto_accept
        {
            // Placement is long work: hand it to the order queue.
            self.fabric
                .submit(JobPayload::ProcessOrder {
                    session_id: result.session_id,
                    retailer_id,
                })
                .await?;
        } else if result.overall_confidence >= self.engine.config().needs_review {
            if let Some(phone) = phone {
                for clarification in &result.clarifications {
                    self.fabric
                        .submit(JobPayload::SendWhatsApp {
                            to_phone: phone.clone(),
                            template: messaging::TPL_CLARIFICATION_REQUEST.to_string(),
                            variables: vec![clarification.question.clone()],
                            idempotency_key: None,
                        })
                        .await?;
                }
            }
        } else if let Some(phone) = phone {
            self.fabric
                .submit(JobPayload::SendWhatsApp {
                    to_phone: phone,
                    template: messaging::TPL_PARSE_RETRY.to_string(),
                    variables: vec![],
                    idempotency_key: None,
                })
                .await?;
        }
        Ok(result)
    }

    /// Turns an accepted session into one order per selected vendor.
    pub async fn place_from_session(&self, session_id: Uuid) -> Result<Vec<PlaceOrderOutcome>> {
        let mut session = self
            .sessions
            .find(session_id)
            .await?
            .with_context(|| format!("Parse session {} not found", session_id))?;

        let retailer = self
            .retailers
            .find(session.retailer_id)
            .await?
            .with_context(|| format!("Retailer {} not found", session.retailer_id))?;

        // Same payload within the key TTL maps to the same keys, so a
        // replayed webhook cannot create a second order.
        let payload_hash = request_hash(
            format!("{}|{}", session.retailer_id, session.raw_input.trim()).as_bytes(),
        );
        let dedup_base = &payload_hash[..16];

        // Vendor selection per item, then one order per vendor
        let mut groups: BTreeMap<VendorId, Vec<LineItem>> = BTreeMap::new();
        for item in &session.items {
            let (Some(product_id), Some(qty)) = (item.product_id, item.normalized_qty) else {
                continue;
            };
            let decision = self
                .routing
                .select_for_product(product_id, qty, &retailer, &[], None)
                .await?;
            let unit_price = decision
                .shortlist
                .iter()
                .find(|c| c.vendor_id == decision.chosen_vendor_id)
                .map(|c| c.price)
                .unwrap_or(Decimal::ZERO);

            let line_total = LineItem::compute_total(qty, unit_price, Decimal::ZERO);
            groups
                .entry(decision.chosen_vendor_id)
                .or_default()
                .push(LineItem {
                    product_id,
                    product_name: item.product_name.clone().unwrap_or_default(),
                    sku: item.sku.clone().unwrap_or_default(),
                    quantity: qty,
                    unit: item
                        .normalized_unit
                        .clone()
                        .unwrap_or_else(|| "piece".to_string()),
                    unit_price,
                    tax_rate: Decimal::ZERO,
                    line_total,
                });
        }

        let mut outcomes = Vec::with_capacity(groups.len());
        for (vendor_id, line_items) in groups {
            let total = line_items.iter().map(|li| li.line_total).sum();
            let new_order = NewOrder {
                retailer_id: session.retailer_id,
                vendor_id,
                line_items,
                total,
                idempotency_key: Some(format!("ord-{}-{}", dedup_base, vendor_id)),
            };
            outcomes.push(
                self.orders
                    .place_order(new_order, &session.raw_input)
                    .await?,
            );
        }

        session.status = SessionStatus::Accepted;
        self.sessions.save(&session).await?;
        Ok(outcomes)
    }

    /// Registers an uploaded order image, hands back the signed upload
    /// URL and queues processing.
    pub async fn request_image_upload(
        &self,
        retailer_id: RetailerId,
    ) -> Result<(UploadedOrder, String)> {
        let now = Utc::now();
        let upload = UploadedOrder {
            id: Uuid::new_v4(),
            retailer_id,
            object_key: format!("orders/incoming/{}.jpg", Uuid::new_v4()),
            status: UploadStatus::Queued,
            parse_session_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.uploads.insert(&upload).await?;

        let upload_url = self
            .object_store
            .signed_upload_url(&upload.object_key, Duration::from_secs(900))
            .await?;
        self.fabric
            .submit(JobPayload::ProcessImage {
                upload_id: upload.id,
            })
            .await?;
        Ok((upload, upload_url))
    }

    /// Polling accessor for an uploaded order.
    pub async fn upload_status(&self, upload_id: Uuid) -> Result<Option<UploadedOrder>> {
        self.uploads.find(upload_id).await
    }

    /// Image flow: fetch via signed URL, OCR, then the normal inbound
    /// pipeline. Driven by the image-processing queue.
    pub async fn process_uploaded_image(&self, upload_id: Uuid) -> Result<()> {
        let mut upload = self
            .uploads
            .find(upload_id)
            .await?
            .with_context(|| format!("Uploaded order {} not found", upload_id))?;

        upload.status = UploadStatus::Processing;
        self.uploads.save(&upload).await?;

        let read_url = self
            .object_store
            .signed_read_url(&upload.object_key, Duration::from_secs(3600))
            .await?;

        match self.ocr.extract_text(&read_url).await {
            Ok(text) => {
                let result = self
                    .handle_inbound(InputSource::Ocr, &text, upload.retailer_id)
                    .await?;
                upload.status = UploadStatus::Parsed;
                upload.parse_session_id = Some(result.session_id);
                upload.error = None;
                self.uploads.save(&upload).await?;
                Ok(())
            }
            Err(e) => {
                upload.status = UploadStatus::Failed;
                upload.error = Some(format!("{:#}", e));
                self.uploads.save(&upload).await?;
                Err(e).context("OCR extraction failed")
            }
        }
    }
}

fn build_result(session: &ParseSession) -> ParseResult {
    ParseResult {
        session_id: session.id,
        items: session.items.clone(),
        overall_confidence: session.confidence,
        needs_clarification: session.needs_clarification,
        clarifications: session.clarifications.clone(),
        summary: summarize_items(&session.items),
    }
}

/// Renders LLM-extracted items into canonical lines for the shared
/// matching/normalization path.
fn render_extracted(items: &[ExtractedItem]) -> String {
    items
        .iter()
        .map(|item| {
            let product = item.product_text.replace([',', '\n'], " ");
            match (&item.quantity, &item.unit) {
                (Some(qty), Some(unit)) => format!("{} {} {}", qty, unit, product),
                (Some(qty), None) => format!("{} {}", qty, product),
                _ => product,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
