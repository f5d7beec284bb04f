//! Vote engine.

use super::Market;
use crate::storage::generate_id;
use chrono::{DateTime, NaiveDate, Utc};
use exchange_core::vote::{
    account_ready, draw_weight, PerTypeRemaining, QuotaStatus, DAILY_QUOTA,
    PER_TARGET_DAILY_LIMIT,
};
use exchange_core::{EventKind, MarketError, MarketResult, Vote, VoteType};
use serde::{Deserialize, Serialize};

/// Default length of a vote history page.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// An incoming vote. Fields are optional so missing ones surface as
/// `InvalidInput` in the documented order rather than as a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub target_citizen_id: Option<String>,
    pub vote_type: Option<String>,
}

/// What a successful vote did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub new_index: f64,
    /// Delta actually applied, after any stability dampening
    pub delta_percent: f64,
    pub remaining_quota: u32,
}

/// One row of an actor's vote history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteHistoryEntry {
    pub vote_type: VoteType,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub target_citizen_id: String,
    pub target_alias: Option<String>,
    pub target_index: Option<f64>,
}

impl Market {
    /// Cast one vote.
    ///
    /// Checks run in a fixed order and the first failure wins: halt, actor,
    /// input, target, self-vote, actor record, account age, daily quota,
    /// per-target limit.
    pub fn cast_vote(&self, actor_id: Option<&str>, req: &VoteRequest) -> MarketResult<VoteReceipt> {
        let now = self.now();
        let today = now.date_naive();

        self.ensure_open(now)?;

        let actor_id = actor_id
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(MarketError::Unauthenticated)?;

        let vote_type: VoteType = req
            .vote_type
            .as_deref()
            .ok_or_else(|| MarketError::invalid("voteType is required"))?
            .parse()?;
        let target_id = req
            .target_citizen_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MarketError::invalid("targetCitizenId is required"))?;

        let target = self.load_citizen(target_id)?;
        if target.owner_id == actor_id {
            return Err(MarketError::SelfVoteForbidden);
        }

        let actor = self
            .store
            .get_user(actor_id)?
            .ok_or_else(|| MarketError::not_found(format!("user {actor_id}")))?;
        if !account_ready(actor.created_at, now) {
            return Err(MarketError::AccountCooldown);
        }

        // Reserve one vote from today's quota. The day rollover is persisted
        // in the same row update.
        let mut exhausted = false;
        let actor = self
            .store
            .update_user(actor_id, &mut |u| {
                u.roll_quota(today);
                exhausted = u.daily_quota_remaining == 0;
                if exhausted {
                    return false;
                }
                u.daily_quota_remaining -= 1;
                true
            })?
            .ok_or_else(|| MarketError::not_found(format!("user {actor_id}")))?;
        if exhausted {
            return Err(MarketError::QuotaExceeded);
        }

        let weight = draw_weight(self.dice.as_ref());
        let vote = Vote::new(
            generate_id(actor_id),
            actor_id.to_string(),
            target_id.to_string(),
            vote_type,
            weight,
            now,
        );

        // The per-target count and the insert are one store step.
        let recorded = self.store.record_vote(&vote, PER_TARGET_DAILY_LIMIT);
        if !matches!(recorded, Ok(true)) {
            self.refund_quota(actor_id, today);
        }
        if !recorded? {
            return Err(MarketError::PerTargetLimitExceeded);
        }

        let moved = self
            .move_citizen(target_id, vote_type.signed_delta(weight), now)
            .and_then(|m| m.ok_or_else(|| MarketError::not_found(format!("citizen {target_id}"))));
        let (target, applied) = match moved {
            Ok(moved) => moved,
            Err(e) => {
                self.release_vote(&vote, today);
                return Err(e);
            }
        };

        let event = self
            .event(
                EventKind::Vote,
                format!(
                    "{} {} {} ({:+.2}%)",
                    actor.alias,
                    vote_type.past_tense(),
                    target.alias,
                    applied
                ),
                now,
            )
            .with_target(target_id)
            .with_delta(applied);
        self.store.append_event(&event)?;

        tracing::debug!(
            "Vote {}: {} {} {} ({:+.4}%)",
            vote.id,
            actor_id,
            vote_type,
            target_id,
            applied
        );

        Ok(VoteReceipt {
            new_index: target.index_value,
            delta_percent: applied,
            remaining_quota: actor.daily_quota_remaining,
        })
    }

    /// Give back a reserved vote when the day has not rolled since.
    fn refund_quota(&self, actor_id: &str, today: NaiveDate) {
        let refunded = self.store.update_user(actor_id, &mut |u| {
            if u.quota_reset_date != today {
                return false;
            }
            u.daily_quota_remaining = (u.daily_quota_remaining + 1).min(DAILY_QUOTA);
            true
        });
        if let Err(e) = refunded {
            tracing::warn!("Quota refund for {} failed: {}", actor_id, e);
        }
    }

    /// Undo a recorded vote whose Index move never happened.
    fn release_vote(&self, vote: &Vote, today: NaiveDate) {
        if let Err(e) = self.store.remove_vote(vote) {
            tracing::warn!("Vote {} could not be released: {}", vote.id, e);
        }
        self.refund_quota(&vote.actor_id, today);
    }

    /// What `actor_id` may still cast today, overall and against one target.
    ///
    /// Read-only: a quota from a previous day reports as full without being
    /// written back.
    pub fn vote_quota(&self, actor_id: Option<&str>, target_id: &str) -> MarketResult<QuotaStatus> {
        let actor_id = actor_id
            .filter(|a| !a.trim().is_empty())
            .ok_or(MarketError::Unauthenticated)?;
        let today = self.now().date_naive();

        let user = self
            .store
            .get_user(actor_id)?
            .ok_or_else(|| MarketError::not_found(format!("user {actor_id}")))?;

        let affirm = self
            .store
            .count_votes(actor_id, target_id, VoteType::Affirm, today)?;
        let doubt = self
            .store
            .count_votes(actor_id, target_id, VoteType::Doubt, today)?;

        Ok(QuotaStatus {
            daily_remaining: user.quota_on(today),
            per_type_remaining: PerTypeRemaining::from_counts(affirm, doubt),
        })
    }

    /// Most recent votes cast by `actor_id`, with each target's current state.
    pub fn vote_history(
        &self,
        actor_id: Option<&str>,
        limit: usize,
    ) -> MarketResult<Vec<VoteHistoryEntry>> {
        let actor_id = actor_id
            .filter(|a| !a.trim().is_empty())
            .ok_or(MarketError::Unauthenticated)?;

        let votes = self.store.votes_by_actor(actor_id, limit)?;
        let mut entries = Vec::with_capacity(votes.len());
        for vote in votes {
            let target = self.store.get_citizen(&vote.target_citizen_id)?;
            entries.push(VoteHistoryEntry {
                vote_type: vote.vote_type,
                weight: vote.weight,
                created_at: vote.created_at,
                target_alias: target.as_ref().map(|c| c.alias.clone()),
                target_index: target.as_ref().map(|c| c.index_value),
                target_citizen_id: vote.target_citizen_id,
            });
        }
        Ok(entries)
    }
}
