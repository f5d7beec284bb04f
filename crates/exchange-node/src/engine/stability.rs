//! Stability Protocol purchases.

use super::Market;
use chrono::{DateTime, Utc};
use exchange_core::stability::StabilityPlan;
use exchange_core::{EventKind, MarketError, MarketResult, StabilityDuration, StabilityQuote};
use serde::Serialize;

/// What a purchase cost and bought.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityReceipt {
    pub expires_at: DateTime<Utc>,
    pub cost: f64,
    pub surcharge: f64,
    pub new_index: f64,
}

/// Prices for every duration at a citizen's current Index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityOffer {
    pub citizen_id: String,
    pub index_value: f64,
    pub stability_in_effect: bool,
    pub quotes: Vec<StabilityQuote>,
}

impl Market {
    /// Buy a protection window for `minutes`.
    ///
    /// Eligibility is judged inside the citizen's row update, so the checks
    /// and the debit see the same record.
    pub fn activate_stability(
        &self,
        citizen_id: &str,
        minutes: u32,
    ) -> MarketResult<StabilityReceipt> {
        let now = self.now();
        self.ensure_open(now)?;
        let duration = StabilityDuration::try_from(minutes)?;

        let mut outcome: MarketResult<StabilityPlan> =
            Err(MarketError::not_found(format!("citizen {citizen_id}")));
        self.store.update_citizen(citizen_id, &mut |c| {
            outcome = StabilityPlan::prepare(c, duration, now);
            match &outcome {
                Ok(plan) => {
                    plan.apply_to(c, now);
                    true
                }
                Err(_) => false,
            }
        })?;
        let plan = outcome?;

        let event = self
            .event(
                EventKind::StabilityActivated,
                format!(
                    "Protection purchased: {}m for -{:.2} index (x{:.2} surcharge). Volatility reduced.",
                    duration.minutes(),
                    plan.quote.cost,
                    plan.quote.surcharge
                ),
                now,
            )
            .with_target(citizen_id)
            .with_delta(plan.cost_percent());
        self.store.append_event(&event)?;

        tracing::info!(
            "Stability {}m for {} at cost {:.2}, index {:.2} -> {:.2}",
            duration.minutes(),
            citizen_id,
            plan.quote.cost,
            plan.index_before,
            plan.new_index
        );

        Ok(StabilityReceipt {
            expires_at: plan.expires_at,
            cost: plan.quote.cost,
            surcharge: plan.quote.surcharge,
            new_index: plan.new_index,
        })
    }

    /// Read-only price list for one citizen.
    pub fn stability_quote(&self, citizen_id: &str) -> MarketResult<StabilityOffer> {
        let now = self.now();
        let citizen = self.load_citizen(citizen_id)?;
        Ok(StabilityOffer {
            quotes: StabilityQuote::all_for_index(citizen.index_value),
            index_value: citizen.index_value,
            stability_in_effect: citizen.stability_in_effect(now),
            citizen_id: citizen.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testkit::*;
    use super::*;
    use chrono::Duration;
    use exchange_core::ScriptedDice;

    #[test]
    fn ten_minutes_at_one_hundred() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");

        let receipt = h.market.activate_stability(&a.citizen_id, 10).unwrap();
        assert_eq!(receipt.cost, 1.00);
        assert_eq!(receipt.surcharge, 1.0);
        assert_eq!(receipt.new_index, 99.00);
        assert_eq!(receipt.expires_at, h.market.now() + Duration::minutes(10));

        let citizen = h.market.citizen(&a.citizen_id).unwrap();
        assert!(citizen.stability_in_effect);
        assert_eq!(citizen.citizen.protection_minutes_today, 10);

        let events = h.events_of(EventKind::StabilityActivated);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].delta_percent, Some(-1.0));
    }

    #[test]
    fn refusals_in_order() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");

        assert_eq!(
            h.market.activate_stability(&a.citizen_id, 15),
            Err(MarketError::InvalidDuration(15))
        );
        assert!(matches!(
            h.market.activate_stability("ghost", 10),
            Err(MarketError::NotFound(_))
        ));

        h.market.activate_stability(&a.citizen_id, 10).unwrap();
        assert_eq!(
            h.market.activate_stability(&a.citizen_id, 10),
            Err(MarketError::AlreadyActive)
        );

        // Window over, but the hourly cooldown is not.
        h.clock.advance(Duration::minutes(30));
        assert_eq!(
            h.market.activate_stability(&a.citizen_id, 10),
            Err(MarketError::Cooldown)
        );
    }

    #[test]
    fn daily_cap() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");

        h.market.activate_stability(&a.citizen_id, 30).unwrap();
        h.clock.advance(Duration::minutes(61));
        h.market.activate_stability(&a.citizen_id, 20).unwrap();
        h.clock.advance(Duration::minutes(61));
        // 50 used, 20 more would pass the 60 minute cap.
        assert_eq!(
            h.market.activate_stability(&a.citizen_id, 20),
            Err(MarketError::DailyCapReached)
        );
        h.market.activate_stability(&a.citizen_id, 10).unwrap();
    }

    #[test]
    fn index_floor() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");
        h.set_index(&a.citizen_id, 5.4);

        assert_eq!(
            h.market.activate_stability(&a.citizen_id, 10),
            Err(MarketError::IndexTooLow)
        );
        // Nothing was debited.
        assert_eq!(h.index_of(&a.citizen_id), 5.4);
        assert!(h.events_of(EventKind::StabilityActivated).is_empty());
    }

    #[test]
    fn halted_market_refuses_purchase() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");
        h.halt();
        assert_eq!(
            h.market.activate_stability(&a.citizen_id, 10),
            Err(MarketError::MarketHalted)
        );
    }

    #[test]
    fn quote_lists_every_duration() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");
        h.set_index(&a.citizen_id, 2_000.0);

        let offer = h.market.stability_quote(&a.citizen_id).unwrap();
        let costs: Vec<f64> = offer.quotes.iter().map(|q| q.cost).collect();
        // 2000 × base% × 1.25
        assert_eq!(costs, [25.0, 45.0, 62.5]);
        assert_eq!(h.index_of(&a.citizen_id), 2_000.0);
    }
}
