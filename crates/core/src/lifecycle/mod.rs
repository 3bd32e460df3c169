//! Ticket lifecycle mutations: claim, release and close.
//!
//! Claiming hands a ticket to a single staff member: the claimer gains an
//! explicit view grant while the category's support roles lose theirs.
//! Releasing is the exact inverse. Both are driven by reactions on the
//! ticket's opening message.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::platform::{
    Member, Permission, PermissionOverwrite, Platform, PlatformError, ReactionEvent,
};
use crate::records::{Category, RecordStore, StoreError, Ticket};

/// The reaction that toggles claiming on an opening message.
pub const CLAIM_EMOJI: &str = "🙌";

/// Errors that can occur during lifecycle mutations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("claiming is not enabled for category {0}")]
    ClaimingDisabled(String),

    #[error("member {0} does not hold a support role")]
    NotStaff(String),

    #[error("record store failure: {0}")]
    Store(#[from] StoreError),

    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
}

/// Claim, release and close operations over existing tickets.
pub struct TicketLifecycle {
    store: Arc<dyn RecordStore>,
    platform: Arc<dyn Platform>,
}

impl TicketLifecycle {
    pub fn new(store: Arc<dyn RecordStore>, platform: Arc<dyn Platform>) -> Self {
        Self { store, platform }
    }

    /// Claim `ticket_id` for `member`.
    ///
    /// Requires the category to have claiming enabled and the member to hold
    /// one of its support roles. The claimer gets an explicit view grant and
    /// the support roles are hidden so the claimer handles the ticket alone.
    pub async fn claim(&self, ticket_id: &str, member: &Member) -> Result<Ticket, LifecycleError> {
        let (mut ticket, category) = self.load(ticket_id)?;

        if !category.claiming {
            return Err(LifecycleError::ClaimingDisabled(category.id));
        }
        if !is_staff(member, &category) {
            return Err(LifecycleError::NotStaff(member.id.clone()));
        }

        self.platform
            .set_permission_overwrite(
                &ticket.id,
                &PermissionOverwrite::allow_member(&member.id, vec![Permission::ViewChannel]),
            )
            .await?;

        for role in &category.roles {
            self.platform
                .set_permission_overwrite(
                    &ticket.id,
                    &PermissionOverwrite::deny_role(role, vec![Permission::ViewChannel]),
                )
                .await?;
        }

        ticket.claimed_by = Some(member.id.clone());
        self.store.update_ticket(&ticket)?;

        info!("{} claimed ticket {}", member.username, ticket.id);

        Ok(ticket)
    }

    /// Release `ticket_id`, the inverse of [`TicketLifecycle::claim`].
    ///
    /// Clears the claim, removes the claimer's explicit grant and restores
    /// view access to every support role of the category.
    pub async fn release(
        &self,
        ticket_id: &str,
        member: &Member,
    ) -> Result<Ticket, LifecycleError> {
        let (mut ticket, category) = self.load(ticket_id)?;

        if !is_staff(member, &category) {
            return Err(LifecycleError::NotStaff(member.id.clone()));
        }

        ticket.claimed_by = None;
        self.store.update_ticket(&ticket)?;

        self.platform
            .delete_permission_overwrite(&ticket.id, &member.id)
            .await?;

        for role in &category.roles {
            self.platform
                .set_permission_overwrite(
                    &ticket.id,
                    &PermissionOverwrite::allow_role(role, vec![Permission::ViewChannel]),
                )
                .await?;
        }

        info!("{} released ticket {}", member.username, ticket.id);

        Ok(ticket)
    }

    /// Close `ticket_id`. The backing channel is left to the caller.
    pub fn close(&self, ticket_id: &str) -> Result<Ticket, LifecycleError> {
        let Some(mut ticket) = self.store.ticket(ticket_id)? else {
            return Err(LifecycleError::TicketNotFound(ticket_id.to_string()));
        };

        ticket.open = false;
        self.store.update_ticket(&ticket)?;

        info!("Closed ticket {}", ticket.id);

        Ok(ticket)
    }

    /// Gate for reaction-removal events: releases the ticket when a staff
    /// member withdraws the claim reaction from its opening message.
    ///
    /// Everything that does not match the gate is ignored and `None` is
    /// returned.
    pub async fn handle_reaction_removed(
        &self,
        event: &ReactionEvent,
    ) -> Result<Option<Ticket>, LifecycleError> {
        if event.emoji != CLAIM_EMOJI {
            return Ok(None);
        }

        let Some(ticket) = self.store.ticket(&event.message.channel)? else {
            return Ok(None);
        };
        if ticket.opening_message.as_deref() != Some(event.message.id.as_str()) {
            return Ok(None);
        }

        let member = self.platform.fetch_member(&ticket.guild, &event.user).await?;
        let Some(category) = self.store.category(&ticket.category)? else {
            return Ok(None);
        };
        if !category.claiming || !is_staff(&member, &category) {
            return Ok(None);
        }

        self.release(&ticket.id, &member).await.map(Some)
    }

    /// Gate for reaction-addition events: claims the ticket when a staff
    /// member adds the claim reaction to its opening message.
    pub async fn handle_reaction_added(
        &self,
        event: &ReactionEvent,
    ) -> Result<Option<Ticket>, LifecycleError> {
        if event.emoji != CLAIM_EMOJI {
            return Ok(None);
        }

        let Some(ticket) = self.store.ticket(&event.message.channel)? else {
            return Ok(None);
        };
        if ticket.opening_message.as_deref() != Some(event.message.id.as_str()) {
            return Ok(None);
        }

        let member = self.platform.fetch_member(&ticket.guild, &event.user).await?;
        let Some(category) = self.store.category(&ticket.category)? else {
            return Ok(None);
        };
        if !category.claiming || !is_staff(&member, &category) {
            return Ok(None);
        }

        self.claim(&ticket.id, &member).await.map(Some)
    }

    fn load(&self, ticket_id: &str) -> Result<(Ticket, Category), LifecycleError> {
        let Some(ticket) = self.store.ticket(ticket_id)? else {
            return Err(LifecycleError::TicketNotFound(ticket_id.to_string()));
        };
        let Some(category) = self.store.category(&ticket.category)? else {
            return Err(LifecycleError::CategoryNotFound(ticket.category.clone()));
        };
        Ok((ticket, category))
    }
}

fn is_staff(member: &Member, category: &Category) -> bool {
    member.roles.iter().any(|role| category.roles.contains(role))
}
