// SPDX-License-Identifier: BUSL-1.1
//! # Allocation Engine
//!
//! Splits a donation's gross amount across milestones. Pure function of
//! the campaign snapshot — no IO, no clock — so callers decide when the
//! plan is applied and tests can exercise every edge without a store.
//!
//! Rules, in order:
//!
//! 1. Filling starts at the campaign's current milestone and walks forward.
//! 2. A non-final milestone accepts at most its remaining headroom
//!    (`target - funded`); milestones already at cap are skipped.
//! 3. The final milestone absorbs everything left, even past its target,
//!    so no donated cent is ever unroutable.
//! 4. The slice amounts always sum to the input exactly.

use serde::{Deserialize, Serialize};

use giv_core::Money;

use crate::campaign::Campaign;
use crate::error::LedgerError;

/// One planned slice: an amount bound to a milestone index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub milestone_index: u32,
    pub amount: Money,
}

/// Split a donation amount across the campaign's milestones.
///
/// Errors on a non-positive amount and on a campaign whose current
/// milestone is terminal (closed campaigns accept no donations).
pub fn split_donation(
    campaign: &Campaign,
    amount: Money,
) -> Result<Vec<AllocationSlice>, LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::NonPositiveAmount);
    }
    if !campaign.is_open() {
        return Err(LedgerError::CampaignClosed(campaign.id));
    }

    let count = campaign.milestone_count();
    let mut remaining = amount;
    let mut slices = Vec::new();

    for index in campaign.current_milestone_index..count {
        if index == count - 1 {
            // Final milestone: forced absorption of whatever is left.
            slices.push(AllocationSlice {
                milestone_index: index,
                amount: remaining,
            });
            remaining = Money::ZERO;
            break;
        }

        let headroom = campaign.milestone_headroom(index)?;
        if headroom.is_zero() {
            continue;
        }

        let take = remaining.min(headroom);
        slices.push(AllocationSlice {
            milestone_index: index,
            amount: take,
        });
        remaining = remaining
            .checked_sub(take)
            .ok_or_else(|| LedgerError::InvariantViolation("slice underflow".to_string()))?;
        if remaining.is_zero() {
            break;
        }
    }

    let total = slices
        .iter()
        .try_fold(Money::ZERO, |acc, s| acc.checked_add(s.amount))
        .ok_or_else(|| LedgerError::InvariantViolation("slice sum overflow".to_string()))?;
    if total != amount {
        return Err(LedgerError::InvariantViolation(format!(
            "allocation plan sums to {total}, expected {amount}"
        )));
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use giv_core::CampaignId;
    use proptest::prelude::*;

    fn campaign(targets: &[i64]) -> Campaign {
        let targets: Vec<Money> = targets.iter().map(|t| Money::from_major(*t)).collect();
        Campaign::new(
            CampaignId::new(),
            "test",
            Money::from_major(100_000),
            &targets,
            "ngo-1",
            "0x00000000000000000000000000000000000000aa",
            Utc::now(),
        )
        .unwrap()
    }

    fn slice(index: u32, major: i64) -> AllocationSlice {
        AllocationSlice {
            milestone_index: index,
            amount: Money::from_major(major),
        }
    }

    #[test]
    fn spillover_crosses_the_first_cap() {
        let c = campaign(&[1_000, 2_000, 2_000]);
        let plan = split_donation(&c, Money::from_major(1_500)).unwrap();
        assert_eq!(plan, vec![slice(0, 1_000), slice(1, 500)]);
    }

    #[test]
    fn fits_entirely_in_current_milestone() {
        let c = campaign(&[1_000, 2_000, 2_000]);
        let plan = split_donation(&c, Money::from_major(400)).unwrap();
        assert_eq!(plan, vec![slice(0, 400)]);
    }

    #[test]
    fn exact_cap_fill_produces_single_slice() {
        let c = campaign(&[1_000, 2_000]);
        let plan = split_donation(&c, Money::from_major(1_000)).unwrap();
        assert_eq!(plan, vec![slice(0, 1_000)]);
    }

    #[test]
    fn final_milestone_absorbs_overflow() {
        let mut c = campaign(&[1_000, 2_000, 2_000]);
        c.current_milestone_index = 2;
        let plan = split_donation(&c, Money::from_major(6_000)).unwrap();
        assert_eq!(plan, vec![slice(2, 6_000)]);
    }

    #[test]
    fn large_donation_spans_all_milestones() {
        let c = campaign(&[1_000, 2_000, 2_000]);
        let plan = split_donation(&c, Money::from_major(9_000)).unwrap();
        assert_eq!(
            plan,
            vec![slice(0, 1_000), slice(1, 2_000), slice(2, 6_000)]
        );
    }

    #[test]
    fn skips_already_full_milestones() {
        let mut c = campaign(&[1_000, 2_000, 2_000]);
        // Current milestone reached its cap but has not been approved yet;
        // new funds flow past it.
        c.milestones[0].funded_amount = Money::from_major(1_000);
        let plan = split_donation(&c, Money::from_major(500)).unwrap();
        assert_eq!(plan, vec![slice(1, 500)]);
    }

    #[test]
    fn partially_funded_milestone_takes_headroom_first() {
        let mut c = campaign(&[1_000, 2_000, 2_000]);
        c.milestones[0].funded_amount = Money::from_major(700);
        let plan = split_donation(&c, Money::from_major(500)).unwrap();
        assert_eq!(plan, vec![slice(0, 300), slice(1, 200)]);
    }

    #[test]
    fn single_milestone_campaign_absorbs_everything() {
        let c = campaign(&[1_000]);
        let plan = split_donation(&c, Money::from_major(50_000)).unwrap();
        assert_eq!(plan, vec![slice(0, 50_000)]);
    }

    #[test]
    fn sub_cent_free_exactness() {
        let c = campaign(&[1_000, 2_000]);
        let plan = split_donation(&c, Money::from_minor(100_001)).unwrap();
        assert_eq!(
            plan,
            vec![
                AllocationSlice {
                    milestone_index: 0,
                    amount: Money::from_minor(100_000)
                },
                AllocationSlice {
                    milestone_index: 1,
                    amount: Money::from_minor(1)
                },
            ]
        );
    }

    #[test]
    fn rejects_nonpositive_amount() {
        let c = campaign(&[1_000]);
        assert!(matches!(
            split_donation(&c, Money::ZERO),
            Err(LedgerError::NonPositiveAmount)
        ));
        assert!(split_donation(&c, Money::from_minor(-1)).is_err());
    }

    #[test]
    fn rejects_closed_campaign() {
        let mut c = campaign(&[1_000]);
        c.milestones[0].status = crate::milestone::MilestoneStatus::FailedDeadline;
        assert!(matches!(
            split_donation(&c, Money::from_major(10)),
            Err(LedgerError::CampaignClosed(_))
        ));
    }

    proptest! {
        #[test]
        fn plan_always_sums_to_input(
            targets in proptest::collection::vec(1i64..5_000, 1..6),
            funded in proptest::collection::vec(0i64..5_000, 6),
            cursor in 0u32..6,
            amount in 1i64..2_000_000,
        ) {
            let mut c = campaign(&targets);
            let cursor = cursor.min(c.milestone_count() - 1);
            c.current_milestone_index = cursor;
            for (i, m) in c.milestones.iter_mut().enumerate() {
                m.funded_amount = Money::from_minor(funded[i].min(m.target_amount.minor_units()));
            }

            let amount = Money::from_minor(amount);
            let plan = split_donation(&c, amount).unwrap();

            let total: i64 = plan.iter().map(|s| s.amount.minor_units()).sum();
            prop_assert_eq!(total, amount.minor_units());
            // Slices are ordered, positive, and within range.
            for pair in plan.windows(2) {
                prop_assert!(pair[0].milestone_index < pair[1].milestone_index);
            }
            for s in &plan {
                prop_assert!(s.amount.is_positive());
                prop_assert!(s.milestone_index >= cursor);
                prop_assert!(s.milestone_index < c.milestone_count());
            }
            // Only the final milestone may exceed its headroom.
            for s in &plan {
                if s.milestone_index < c.milestone_count() - 1 {
                    let headroom = c.milestone_headroom(s.milestone_index).unwrap();
                    prop_assert!(s.amount <= headroom);
                }
            }
        }
    }
}
