//! Per-member open-ticket quota enforcement.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::records::{Category, RecordStore, StoreError, Ticket, TicketQuery};

/// Topic previews in denial messages are cut at this many characters.
const TOPIC_PREVIEW_LEN: usize = 30;

/// Why an admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The category allows one ticket per member and the member has one.
    AlreadyHasTicket,
    /// The member reached the category's multi-ticket limit.
    MaxReached,
}

/// Compact reference to an existing open ticket, used in denial responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    /// Backing channel handle.
    pub channel: String,
    /// Per-guild ordinal.
    pub number: u32,
    /// Topic truncated to 30 characters, `None` when the ticket has no topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_preview: Option<String>,
}

impl TicketSummary {
    fn from_ticket(ticket: &Ticket) -> Self {
        let topic_preview = ticket.topic.as_ref().map(|topic| {
            if topic.chars().count() > TOPIC_PREVIEW_LEN {
                let truncated: String = topic.chars().take(TOPIC_PREVIEW_LEN).collect();
                format!("{}...", truncated)
            } else {
                topic.clone()
            }
        });

        Self {
            channel: ticket.id.clone(),
            number: ticket.number,
            topic_preview,
        }
    }
}

/// A denied admission, carrying the member's existing open tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDenial {
    pub reason: DenialReason,
    /// The open tickets counted against the quota, oldest first.
    pub existing: Vec<TicketSummary>,
}

/// Result of an admission check. A denial is an expected business outcome,
/// not a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied(QuotaDenial),
}

/// Counts open tickets per (member, category) and applies admission policy.
///
/// The count and any subsequent provisioning write are separate steps; a
/// concurrent duplicate request can observe the same count and both proceed.
/// Serializing admission per (creator, category) is left to a hardened
/// storage layer.
pub struct QuotaEnforcer {
    store: Arc<dyn RecordStore>,
}

impl QuotaEnforcer {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Check whether `creator` may open another ticket in `category`.
    pub fn admit(&self, category: &Category, creator: &str) -> Result<Admission, StoreError> {
        let query = TicketQuery::new()
            .in_category(&category.id)
            .by_creator(creator)
            .open(true);

        let existing = self.store.tickets(&query)?;

        if (existing.len() as u32) < category.max_per_member {
            return Ok(Admission::Allowed);
        }

        let reason = if category.max_per_member == 1 {
            DenialReason::AlreadyHasTicket
        } else {
            DenialReason::MaxReached
        };

        Ok(Admission::Denied(QuotaDenial {
            reason,
            existing: existing.iter().map(TicketSummary::from_ticket).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CreateTicketRecord, SqliteRecordStore};

    fn category(max_per_member: u32) -> Category {
        Category {
            id: "cat-1".to_string(),
            guild: "guild-1".to_string(),
            name: "Support".to_string(),
            max_per_member,
            claiming: false,
            image: None,
            name_format: "ticket-{number}".to_string(),
            opening_message: "Hello".to_string(),
            opening_questions: None,
            ping: None,
            require_topic: false,
            roles: vec![],
            survey: None,
        }
    }

    fn open_ticket(store: &dyn RecordStore, id: &str, number: u32, topic: Option<&str>) {
        store
            .create_ticket(CreateTicketRecord {
                id: id.to_string(),
                guild: "guild-1".to_string(),
                number,
                creator: "user-1".to_string(),
                category: "cat-1".to_string(),
                topic: topic.map(String::from),
            })
            .unwrap();
    }

    fn enforcer() -> (Arc<SqliteRecordStore>, QuotaEnforcer) {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let enforcer = QuotaEnforcer::new(store.clone());
        (store, enforcer)
    }

    #[test]
    fn test_admit_allows_below_quota() {
        let (_, enforcer) = enforcer();
        let admission = enforcer.admit(&category(1), "user-1").unwrap();
        assert_eq!(admission, Admission::Allowed);
    }

    #[test]
    fn test_admit_denies_single_ticket_quota() {
        let (store, enforcer) = enforcer();
        open_ticket(store.as_ref(), "chan-42", 42, None);

        let admission = enforcer.admit(&category(1), "user-1").unwrap();
        match admission {
            Admission::Denied(denial) => {
                assert_eq!(denial.reason, DenialReason::AlreadyHasTicket);
                assert_eq!(denial.existing.len(), 1);
                assert_eq!(denial.existing[0].channel, "chan-42");
            }
            Admission::Allowed => panic!("expected denial"),
        }
    }

    #[test]
    fn test_admit_denies_at_multi_ticket_quota() {
        let (store, enforcer) = enforcer();
        open_ticket(store.as_ref(), "chan-1", 1, Some("printer on fire"));
        open_ticket(store.as_ref(), "chan-2", 2, None);

        let admission = enforcer.admit(&category(2), "user-1").unwrap();
        match admission {
            Admission::Denied(denial) => {
                assert_eq!(denial.reason, DenialReason::MaxReached);
                let channels: Vec<_> =
                    denial.existing.iter().map(|t| t.channel.as_str()).collect();
                assert_eq!(channels, vec!["chan-1", "chan-2"]);
            }
            Admission::Allowed => panic!("expected denial"),
        }
    }

    #[test]
    fn test_admit_allows_below_multi_ticket_quota() {
        let (store, enforcer) = enforcer();
        open_ticket(store.as_ref(), "chan-1", 1, None);

        let admission = enforcer.admit(&category(2), "user-1").unwrap();
        assert_eq!(admission, Admission::Allowed);
    }

    #[test]
    fn test_closed_tickets_do_not_count() {
        let (store, enforcer) = enforcer();
        open_ticket(store.as_ref(), "chan-1", 1, None);

        let mut ticket = store.ticket("chan-1").unwrap().unwrap();
        ticket.open = false;
        store.update_ticket(&ticket).unwrap();

        let admission = enforcer.admit(&category(1), "user-1").unwrap();
        assert_eq!(admission, Admission::Allowed);
    }

    #[test]
    fn test_other_members_tickets_do_not_count() {
        let (store, enforcer) = enforcer();
        open_ticket(store.as_ref(), "chan-1", 1, None);

        let admission = enforcer.admit(&category(1), "user-2").unwrap();
        assert_eq!(admission, Admission::Allowed);
    }

    #[test]
    fn test_topic_preview_truncation() {
        let ticket = Ticket {
            id: "chan-1".to_string(),
            guild: "guild-1".to_string(),
            number: 1,
            creator: "user-1".to_string(),
            category: "cat-1".to_string(),
            topic: Some("a".repeat(45)),
            open: true,
            claimed_by: None,
            opening_message: None,
            created_at: chrono::Utc::now(),
        };

        let summary = TicketSummary::from_ticket(&ticket);
        let preview = summary.topic_preview.unwrap();
        assert_eq!(preview.len(), 33); // 30 characters plus "..."
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_short_topic_not_truncated() {
        let ticket = Ticket {
            id: "chan-1".to_string(),
            guild: "guild-1".to_string(),
            number: 1,
            creator: "user-1".to_string(),
            category: "cat-1".to_string(),
            topic: Some("printer".to_string()),
            open: true,
            claimed_by: None,
            opening_message: None,
            created_at: chrono::Utc::now(),
        };

        let summary = TicketSummary::from_ticket(&ticket);
        assert_eq!(summary.topic_preview.as_deref(), Some("printer"));
    }
}
