//! Capture pipeline: inbound text to routed item.
//!
//! # Responsibility
//! - Drive the capture flow: mutation intent detection, forced
//!   prefixes, classification, the confidence gate and routing.
//! - Handle button callbacks (fix, cancel, done, delete, move, undo).
//!
//! # Invariants
//! - The audit record is committed before any routing attempt, so a
//!   crash mid-route never loses the raw message.
//! - Item creation and the audit processed flag flip in one
//!   transaction.
//! - Cross-user ids arriving through buttons surface as a generic
//!   not-found.
//!
//! # See also
//! - `classify` for the gate and the external classifier boundary.
//! - `service::resolver` for target matching.

use crate::classify::{
    derive_title, parse_forced_prefix, route_decision, Classification, ClassifiedCategory,
    Classifier, Intent, RouteDecision,
};
use crate::config::CoreConfig;
use crate::model::audit::{AuditId, AuditRecord};
use crate::model::item::{now_epoch_ms, CapturedItem, Category, ItemId, ItemStatus, UserId};
use crate::model::undo::UndoAction;
use crate::repo::item_repo::{ItemRepository, RepoError, RepoResult, SqliteItemRepository};
use crate::repo::{audit_repo, pending_repo};
use crate::service::lifecycle::{LifecycleEngine, LifecycleError};
use crate::service::resolver::{self, MatchCandidate, TargetMatch};
use crate::service::undo::{undo_last, UndoOutcome};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

/// Transport-agnostic result of one inbound message or button press.
/// Chat frontends render these; the core never formats user-facing
/// strings.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderableResult {
    /// Auto-routed capture.
    Captured {
        audit_id: AuditId,
        item_id: ItemId,
        category: Category,
        title: String,
        confidence: f64,
        schedule_date: Option<NaiveDate>,
        next_action: Option<String>,
    },
    /// Low-confidence capture parked in the review queue.
    CapturedForReview {
        audit_id: AuditId,
        title: String,
        confidence: f64,
    },
    /// A mutation phrase completed an existing item.
    Completed {
        item_id: ItemId,
        title: String,
        /// Set when a recurrence successor was spawned.
        next_date: Option<NaiveDate>,
    },
    /// Delete request parked; the user must press confirm.
    DeleteConfirmation {
        item_id: ItemId,
        category: Category,
        title: String,
    },
    Deleted {
        title: String,
    },
    /// Confirmation cancelled, expired or never requested.
    DeleteCancelled,
    StatusChanged {
        title: String,
        from: ItemStatus,
        to: ItemStatus,
    },
    /// Item moved to another bucket via a fix/move button.
    Reclassified {
        item_id: ItemId,
        category: Category,
        title: String,
    },
    /// Review-queue capture discarded.
    CaptureCancelled {
        audit_id: AuditId,
    },
    Undone {
        action: UndoAction,
        title: String,
    },
    UndoEmpty,
    /// The mutation phrase matched several items.
    Ambiguous {
        candidates: Vec<MatchCandidate>,
    },
    /// Unknown id, or an id owned by another user.
    NotFound,
    Rejected {
        reason: String,
    },
}

/// Parsed button callback token.
#[derive(Debug, Clone, PartialEq)]
enum ActionToken {
    Fix { audit_id: AuditId, category: Category },
    CancelCapture { audit_id: AuditId },
    Done { item_id: ItemId },
    Delete { item_id: ItemId },
    Move { item_id: ItemId, category: Category },
    ConfirmDelete { item_id: ItemId },
    CancelDelete,
    Undo,
}

impl ActionToken {
    fn parse(token: &str) -> Option<Self> {
        let mut parts = token.trim().split(':');
        let head = parts.next()?;
        let rest: Vec<&str> = parts.collect();
        match (head, rest.as_slice()) {
            ("undo", []) => Some(Self::Undo),
            ("cancel_del", []) => Some(Self::CancelDelete),
            ("done", [id]) => Some(Self::Done {
                item_id: Uuid::parse_str(id).ok()?,
            }),
            ("delete" | "del", [id]) => Some(Self::Delete {
                item_id: Uuid::parse_str(id).ok()?,
            }),
            ("confirm_del", [id]) => Some(Self::ConfirmDelete {
                item_id: Uuid::parse_str(id).ok()?,
            }),
            ("move" | "moveto", [id, label]) => Some(Self::Move {
                item_id: Uuid::parse_str(id).ok()?,
                category: Category::parse_label(label)?,
            }),
            ("fix", [id, label]) => Some(Self::Fix {
                audit_id: Uuid::parse_str(id).ok()?,
                category: Category::parse_label(label)?,
            }),
            ("cancel", [id]) => Some(Self::CancelCapture {
                audit_id: Uuid::parse_str(id).ok()?,
            }),
            _ => None,
        }
    }
}

/// The capture pipeline; generic over the classifier so tests can
/// substitute a scripted one.
pub struct CapturePipeline<C: Classifier> {
    config: CoreConfig,
    classifier: C,
    engine: LifecycleEngine,
}

impl<C: Classifier> CapturePipeline<C> {
    pub fn new(config: CoreConfig, classifier: C) -> Self {
        let engine = LifecycleEngine::new(config.clone());
        Self {
            config,
            classifier,
            engine,
        }
    }

    /// Entry point for one inbound message.
    pub fn handle_inbound(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        text: &str,
        source: &str,
    ) -> RepoResult<RenderableResult> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(RenderableResult::Rejected {
                reason: "empty message".to_string(),
            });
        }

        // `done: ...` is an explicit completion, no intent call needed.
        if let Some(target) = strip_done_prefix(text) {
            return self.apply_completion_phrase(conn, user_id, target);
        }

        if let Some((category, rest)) = parse_forced_prefix(text) {
            if rest.is_empty() {
                return Ok(RenderableResult::Rejected {
                    reason: "empty message after category prefix".to_string(),
                });
            }
            let classification = self.classify_forced(category, rest);
            return self.capture(conn, user_id, text, source, classification);
        }

        match self.detect_intent_lossy(text) {
            Intent::Completion {
                target,
                bucket_hint,
            } => {
                let hint = bucket_hint.or_else(|| resolver::bucket_hint_from_text(text));
                match resolver::resolve_target(conn, user_id, &target, hint)? {
                    TargetMatch::Unique(item) => {
                        return self.complete_item(conn, user_id, item.id)
                    }
                    TargetMatch::Ambiguous(candidates) => {
                        return Ok(RenderableResult::Ambiguous { candidates })
                    }
                    TargetMatch::None => {} // fall through to capture
                }
            }
            Intent::Deletion {
                target,
                bucket_hint,
            } => {
                let hint = bucket_hint.or_else(|| resolver::bucket_hint_from_text(text));
                match resolver::resolve_target(conn, user_id, &target, hint)? {
                    TargetMatch::Unique(item) => {
                        return self.request_delete(conn, user_id, &item)
                    }
                    TargetMatch::Ambiguous(candidates) => {
                        return Ok(RenderableResult::Ambiguous { candidates })
                    }
                    TargetMatch::None => {}
                }
            }
            Intent::StatusChange {
                target,
                new_status,
                bucket_hint,
            } => {
                let hint = bucket_hint.or_else(|| resolver::bucket_hint_from_text(text));
                match resolver::resolve_target(conn, user_id, &target, hint)? {
                    TargetMatch::Unique(item) => {
                        return self.change_status(conn, user_id, item.id, new_status)
                    }
                    TargetMatch::Ambiguous(candidates) => {
                        return Ok(RenderableResult::Ambiguous { candidates })
                    }
                    TargetMatch::None => {}
                }
            }
            Intent::None => {}
        }

        let classification = match self.classifier.classify(text) {
            Ok(classification) => classification,
            Err(err) => {
                warn!("event=classify_failed module=capture error=\"{err}\"");
                Classification::unavailable_fallback(text)
            }
        };
        self.capture(conn, user_id, text, source, classification)
    }

    /// Entry point for one button callback.
    pub fn handle_button_action(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        token: &str,
    ) -> RepoResult<RenderableResult> {
        let Some(action) = ActionToken::parse(token) else {
            return Ok(RenderableResult::Rejected {
                reason: format!("unrecognized action `{token}`"),
            });
        };

        match action {
            ActionToken::Done { item_id } => self.complete_item(conn, user_id, item_id),
            ActionToken::Delete { item_id } => {
                let item = match SqliteItemRepository::new(conn).get_item(user_id, item_id) {
                    Ok(item) => item,
                    Err(RepoError::NotFound(_) | RepoError::NotAuthorized(_)) => {
                        return Ok(RenderableResult::NotFound)
                    }
                    Err(err) => return Err(err),
                };
                self.request_delete(conn, user_id, &item)
            }
            ActionToken::ConfirmDelete { item_id } => {
                self.confirm_delete(conn, user_id, item_id)
            }
            ActionToken::CancelDelete => {
                pending_repo::clear(conn, user_id)?;
                Ok(RenderableResult::DeleteCancelled)
            }
            ActionToken::Undo => match undo_last(conn, user_id)? {
                UndoOutcome::Reverted { action, title } => {
                    Ok(RenderableResult::Undone { action, title })
                }
                UndoOutcome::Empty => Ok(RenderableResult::UndoEmpty),
            },
            ActionToken::Move { item_id, category } => {
                self.move_item(conn, user_id, item_id, category)
            }
            ActionToken::Fix { audit_id, category } => {
                self.reclassify(conn, user_id, audit_id, category)
            }
            ActionToken::CancelCapture { audit_id } => {
                self.cancel_capture(conn, user_id, audit_id)
            }
        }
    }

    fn classify_forced(&self, category: Category, rest: &str) -> Classification {
        match self.classifier.classify(rest) {
            Ok(mut classification) => {
                classification.category = ClassifiedCategory::Bucket(category);
                classification.confidence = 1.0;
                classification
            }
            // Forced prefixes route deterministically even when the
            // classifier is down.
            Err(err) => {
                warn!("event=classify_failed module=capture error=\"{err}\" forced={category}");
                Classification {
                    category: ClassifiedCategory::Bucket(category),
                    confidence: 1.0,
                    title: derive_title(rest),
                    summary: Some(rest.to_string()),
                    next_action: None,
                    due_date: None,
                    follow_up_reason: None,
                    follow_up_date: None,
                }
            }
        }
    }

    fn detect_intent_lossy(&self, text: &str) -> Intent {
        match self.classifier.detect_intent(text) {
            Ok(intent) => intent,
            // Degrade to plain capture; the message is never dropped.
            Err(err) => {
                warn!("event=intent_failed module=capture error=\"{err}\"");
                Intent::None
            }
        }
    }

    fn apply_completion_phrase(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        target: &str,
    ) -> RepoResult<RenderableResult> {
        let hint = resolver::bucket_hint_from_text(target);
        match resolver::resolve_target(conn, user_id, target, hint)? {
            TargetMatch::Unique(item) => self.complete_item(conn, user_id, item.id),
            TargetMatch::Ambiguous(candidates) => Ok(RenderableResult::Ambiguous { candidates }),
            TargetMatch::None => Ok(RenderableResult::Rejected {
                reason: format!("nothing open matches `{target}`"),
            }),
        }
    }

    /// The capture path proper: audit first, then the gate, then routing.
    fn capture(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        raw_text: &str,
        source: &str,
        classification: Classification,
    ) -> RepoResult<RenderableResult> {
        let record = AuditRecord::new(
            user_id,
            raw_text,
            source,
            classification.category.label(),
            classification.confidence,
            classification.title.clone(),
            classification_payload(&classification),
        );
        // Commits on its own before routing; a crash below leaves the
        // raw message recoverable from the review queue.
        audit_repo::insert(conn, &record)?;

        match route_decision(self.config.confidence_threshold, &classification) {
            RouteDecision::Auto(category) => {
                let item = item_from_classification(user_id, category, &classification, record.id);
                let tx = conn.transaction()?;
                {
                    let repo = SqliteItemRepository::new(&tx);
                    repo.create_item(&item)?;
                    audit_repo::mark_processed(&tx, record.id, category.as_str(), Some(item.id))?;
                }
                tx.commit()?;
                info!(
                    "event=captured module=capture audit_id={} item_id={} category={} confidence={:.2}",
                    record.id, item.id, category, classification.confidence
                );
                Ok(RenderableResult::Captured {
                    audit_id: record.id,
                    item_id: item.id,
                    category,
                    title: item.title.clone(),
                    confidence: classification.confidence,
                    schedule_date: item.schedule_date(),
                    next_action: item.next_action,
                })
            }
            RouteDecision::Review => {
                info!(
                    "event=parked_for_review module=capture audit_id={} confidence={:.2}",
                    record.id, classification.confidence
                );
                Ok(RenderableResult::CapturedForReview {
                    audit_id: record.id,
                    title: classification.title,
                    confidence: classification.confidence,
                })
            }
        }
    }

    fn complete_item(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        item_id: ItemId,
    ) -> RepoResult<RenderableResult> {
        match self.engine.complete(conn, user_id, item_id) {
            Ok(outcome) => Ok(RenderableResult::Completed {
                item_id: outcome.item.id,
                title: outcome.item.title,
                next_date: outcome.successor.and_then(|s| s.schedule_date()),
            }),
            Err(err) => map_lifecycle_error(err),
        }
    }

    fn change_status(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        item_id: ItemId,
        to: ItemStatus,
    ) -> RepoResult<RenderableResult> {
        let from = match SqliteItemRepository::new(conn).get_item(user_id, item_id) {
            Ok(item) => item.status,
            Err(RepoError::NotFound(_) | RepoError::NotAuthorized(_)) => {
                return Ok(RenderableResult::NotFound)
            }
            Err(err) => return Err(err),
        };
        match self.engine.set_status(conn, user_id, item_id, to) {
            Ok(outcome) => {
                if to == ItemStatus::Completed {
                    Ok(RenderableResult::Completed {
                        item_id: outcome.item.id,
                        title: outcome.item.title,
                        next_date: outcome.successor.and_then(|s| s.schedule_date()),
                    })
                } else {
                    Ok(RenderableResult::StatusChanged {
                        title: outcome.item.title,
                        from,
                        to,
                    })
                }
            }
            Err(err) => map_lifecycle_error(err),
        }
    }

    fn request_delete(
        &self,
        conn: &Connection,
        user_id: UserId,
        item: &CapturedItem,
    ) -> RepoResult<RenderableResult> {
        pending_repo::set_slot(conn, user_id, item.id, &item.title, now_epoch_ms())?;
        info!(
            "event=delete_requested module=capture item_id={} ttl_secs={}",
            item.id, self.config.pending_delete_ttl_secs
        );
        Ok(RenderableResult::DeleteConfirmation {
            item_id: item.id,
            category: item.category,
            title: item.title.clone(),
        })
    }

    fn confirm_delete(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        item_id: ItemId,
    ) -> RepoResult<RenderableResult> {
        let ttl_ms = self.config.pending_delete_ttl_secs * 1000;
        let slot = pending_repo::take_if_fresh(conn, user_id, ttl_ms, now_epoch_ms())?;
        match slot {
            Some(pending) if pending.item_id == item_id => {
                match self.engine.delete(conn, user_id, item_id) {
                    Ok(item) => Ok(RenderableResult::Deleted { title: item.title }),
                    Err(err) => map_lifecycle_error(err),
                }
            }
            // Expired, cleared, or a confirmation for a different item.
            _ => Ok(RenderableResult::DeleteCancelled),
        }
    }

    fn move_item(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        item_id: ItemId,
        category: Category,
    ) -> RepoResult<RenderableResult> {
        match self.engine.move_item(conn, user_id, item_id, category) {
            Ok(item) => Ok(RenderableResult::Reclassified {
                item_id: item.id,
                category: item.category,
                title: item.title,
            }),
            Err(err) => map_lifecycle_error(err),
        }
    }

    /// Fix button: route (or re-route) an audited message into the
    /// chosen bucket.
    fn reclassify(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        audit_id: AuditId,
        category: Category,
    ) -> RepoResult<RenderableResult> {
        let record = match audit_repo::get(conn, user_id, audit_id) {
            Ok(record) => record,
            Err(RepoError::AuditNotFound(_)) => return Ok(RenderableResult::NotFound),
            Err(err) => return Err(err),
        };

        // Already routed: move the existing item instead of duplicating.
        // The audit routing update commits with the move or not at all.
        if let Some(target_id) = record.target_id.filter(|_| record.processed) {
            let tx = conn.transaction()?;
            let moved = match self.engine.move_in_tx(&tx, user_id, target_id, category) {
                Ok(item) => item,
                Err(err) => return map_lifecycle_error(err),
            };
            audit_repo::update_routing(&tx, audit_id, category.as_str(), Some(moved.id))?;
            tx.commit()?;
            info!(
                "event=reclassified module=capture audit_id={audit_id} item_id={} category={category}",
                moved.id
            );
            return Ok(RenderableResult::Reclassified {
                item_id: moved.id,
                category: moved.category,
                title: moved.title,
            });
        }

        let mut item = CapturedItem::new(user_id, category, record.title.clone());
        item.notes = Some(record.raw_message.clone());
        item.audit_id = Some(audit_id);

        let tx = conn.transaction()?;
        {
            let repo = SqliteItemRepository::new(&tx);
            repo.create_item(&item)?;
            audit_repo::update_routing(&tx, audit_id, category.as_str(), Some(item.id))?;
        }
        tx.commit()?;
        info!(
            "event=reclassified module=capture audit_id={audit_id} item_id={} category={category}",
            item.id
        );
        Ok(RenderableResult::Reclassified {
            item_id: item.id,
            category,
            title: item.title,
        })
    }

    /// Cancel button: drop a capture. Removes the routed item too when
    /// one exists, keeping it restorable through undo.
    fn cancel_capture(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        audit_id: AuditId,
    ) -> RepoResult<RenderableResult> {
        let record = match audit_repo::get(conn, user_id, audit_id) {
            Ok(record) => record,
            Err(RepoError::AuditNotFound(_)) => return Ok(RenderableResult::NotFound),
            Err(err) => return Err(err),
        };

        if let Some(target_id) = record.target_id {
            match self.engine.delete(conn, user_id, target_id) {
                Ok(_) => {}
                Err(LifecycleError::Repo(
                    RepoError::NotFound(_) | RepoError::NotAuthorized(_),
                )) => {}
                Err(LifecycleError::Repo(err)) => return Err(err),
                Err(_) => {}
            }
        }
        audit_repo::delete(conn, user_id, audit_id)?;
        info!("event=capture_cancelled module=capture audit_id={audit_id}");
        Ok(RenderableResult::CaptureCancelled { audit_id })
    }
}

fn map_lifecycle_error(err: LifecycleError) -> RepoResult<RenderableResult> {
    match err {
        LifecycleError::Repo(RepoError::NotFound(_) | RepoError::NotAuthorized(_)) => {
            Ok(RenderableResult::NotFound)
        }
        LifecycleError::Repo(err) => Err(err),
        other => Ok(RenderableResult::Rejected {
            reason: other.to_string(),
        }),
    }
}

fn strip_done_prefix(text: &str) -> Option<&str> {
    let rest = text
        .strip_prefix("done:")
        .or_else(|| text.strip_prefix("Done:"))
        .or_else(|| text.strip_prefix("DONE:"))?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

/// Builds the routed item, keeping only the variant fields the target
/// bucket carries.
fn item_from_classification(
    user_id: UserId,
    category: Category,
    classification: &Classification,
    audit_id: AuditId,
) -> CapturedItem {
    let mut item = CapturedItem::new(user_id, category, classification.title.clone());
    item.notes = classification.summary.clone();
    item.audit_id = Some(audit_id);
    if category.allows_due_date() {
        item.due_date = classification.due_date;
        item.next_action = classification.next_action.clone();
    }
    if category.allows_follow_up() {
        item.follow_up_date = classification.follow_up_date.or(classification.due_date);
        item.follow_up_reason = classification.follow_up_reason.clone();
    }
    item
}

fn classification_payload(classification: &Classification) -> serde_json::Value {
    json!({
        "category": classification.category.label(),
        "confidence": classification.confidence,
        "title": classification.title,
        "summary": classification.summary,
        "next_action": classification.next_action,
        "due_date": classification.due_date.map(|d| d.to_string()),
        "follow_up_date": classification.follow_up_date.map(|d| d.to_string()),
        "follow_up_reason": classification.follow_up_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::{strip_done_prefix, ActionToken};
    use crate::model::item::Category;
    use uuid::Uuid;

    #[test]
    fn done_prefix_is_stripped() {
        assert_eq!(strip_done_prefix("done: call rachel"), Some("call rachel"));
        assert_eq!(strip_done_prefix("done:"), None);
        assert_eq!(strip_done_prefix("don't forget milk"), None);
    }

    #[test]
    fn action_tokens_parse() {
        let id = Uuid::new_v4();
        assert_eq!(ActionToken::parse("undo"), Some(ActionToken::Undo));
        assert_eq!(
            ActionToken::parse(&format!("done:{id}")),
            Some(ActionToken::Done { item_id: id })
        );
        assert_eq!(
            ActionToken::parse(&format!("fix:{id}:project")),
            Some(ActionToken::Fix {
                audit_id: id,
                category: Category::Project
            })
        );
        // Long and short delete spellings are both accepted.
        assert_eq!(
            ActionToken::parse(&format!("delete:{id}")),
            Some(ActionToken::Delete { item_id: id })
        );
        assert_eq!(
            ActionToken::parse(&format!("del:{id}")),
            Some(ActionToken::Delete { item_id: id })
        );
        assert_eq!(ActionToken::parse("fix:not-a-uuid:project"), None);
        assert_eq!(ActionToken::parse("bogus"), None);
    }
}
