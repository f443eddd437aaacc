//! Ad-hoc income/cost estimate for a hypothetical flock. Pure
//! arithmetic over user-supplied shares and prices; nothing here
//! touches the database or the validation engine.

const GRAMS_PER_KG: f64 = 1000.0;
const KG_PER_SACK: f64 = 50.0;

/// One egg grade with its share of production and unit price.
#[derive(Debug, Clone, PartialEq)]
pub struct EggType {
    pub name: String,
    /// Share of total production, in percent.
    pub percent: f64,
    pub price: f64,
}

/// A flat expense item.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub name: String,
    pub cost: f64,
}

/// Daily feed per duck and feed pricing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedPlan {
    /// Grams of feed per duck.
    pub quantity_g: f64,
    /// Price of one 50 kg sack.
    pub price_per_sack: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomeInput {
    pub flock_size: f64,
    /// Expected laying percentage.
    pub production_percent: f64,
    pub egg_types: Vec<EggType>,
    pub expenses: Vec<Expense>,
    pub feed: FeedPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EggTypeBreakdown {
    pub name: String,
    pub percent: f64,
    pub eggs: f64,
    pub price: f64,
    pub income: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedCost {
    pub quantity_g: f64,
    pub sacks: f64,
    pub price_per_sack: f64,
    pub cost: f64,
}

/// Cost of producing a single egg, split into its components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionCost {
    pub feed: f64,
    pub expenses: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomeResult {
    pub total_eggs: f64,
    pub breakdown: Vec<EggTypeBreakdown>,
    /// Sum of the egg-type shares; callers can warn when it isn't 100.
    pub percent_total: f64,
    pub total_income: f64,
    pub expense_breakdown: Vec<Expense>,
    pub expenses_total: f64,
    pub feed: FeedCost,
    pub net_income: f64,
    pub production_cost: ProductionCost,
}

/// Runs the estimate.
pub fn calculate_income(input: &IncomeInput) -> IncomeResult {
    let total_eggs = input.flock_size * (input.production_percent / 100.0);

    let mut breakdown = Vec::with_capacity(input.egg_types.len());
    let mut total_income = 0.0;
    let mut percent_total = 0.0;
    for egg_type in &input.egg_types {
        let eggs = total_eggs * (egg_type.percent / 100.0);
        let income = eggs * egg_type.price;
        percent_total += egg_type.percent;
        total_income += income;
        breakdown.push(EggTypeBreakdown {
            name: egg_type.name.clone(),
            percent: egg_type.percent,
            eggs: round2(eggs),
            price: egg_type.price,
            income: round2(income),
        });
    }

    let expenses_total: f64 = input.expenses.iter().map(|e| e.cost).sum();

    // grams per duck -> whole flock -> kg -> 50 kg sacks
    let feed_overall_g = input.feed.quantity_g * input.flock_size;
    let feed_sacks = feed_overall_g / GRAMS_PER_KG / KG_PER_SACK;
    let feed_cost = feed_sacks * input.feed.price_per_sack;

    let net_income = total_income - (feed_cost + expenses_total);

    let feed_price_per_g = input.feed.price_per_sack / KG_PER_SACK / GRAMS_PER_KG;
    let production_cost_feed = feed_price_per_g * input.feed.quantity_g;
    let production_cost_expenses = if total_eggs > 0.0 {
        expenses_total / total_eggs
    } else {
        0.0
    };

    IncomeResult {
        total_eggs: round2(total_eggs),
        breakdown,
        percent_total,
        total_income: round2(total_income),
        expense_breakdown: input.expenses.clone(),
        expenses_total,
        feed: FeedCost {
            quantity_g: input.feed.quantity_g,
            sacks: feed_sacks,
            price_per_sack: input.feed.price_per_sack,
            cost: round2(feed_cost),
        },
        net_income: round2(net_income),
        production_cost: ProductionCost {
            feed: production_cost_feed,
            expenses: production_cost_expenses,
            total: production_cost_feed + production_cost_expenses,
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> IncomeInput {
        IncomeInput {
            flock_size: 100.0,
            production_percent: 80.0,
            egg_types: vec![
                EggType {
                    name: "Good".to_string(),
                    percent: 75.0,
                    price: 10.0,
                },
                EggType {
                    name: "Cracked".to_string(),
                    percent: 25.0,
                    price: 4.0,
                },
            ],
            expenses: vec![Expense {
                name: "Vitamins".to_string(),
                cost: 50.0,
            }],
            feed: FeedPlan {
                quantity_g: 150.0,
                price_per_sack: 1500.0,
            },
        }
    }

    #[test]
    fn test_total_eggs_and_breakdown() {
        let result = calculate_income(&sample_input());

        assert_eq!(result.total_eggs, 80.0);
        assert_eq!(result.percent_total, 100.0);

        // 60 good eggs at 10 plus 20 cracked at 4
        assert_eq!(result.breakdown[0].eggs, 60.0);
        assert_eq!(result.breakdown[0].income, 600.0);
        assert_eq!(result.breakdown[1].eggs, 20.0);
        assert_eq!(result.breakdown[1].income, 80.0);
        assert_eq!(result.total_income, 680.0);
    }

    #[test]
    fn test_feed_cost_converts_grams_to_sacks() {
        let result = calculate_income(&sample_input());

        // 150 g * 100 ducks = 15 kg = 0.3 sacks
        assert!((result.feed.sacks - 0.3).abs() < 1e-9);
        assert_eq!(result.feed.cost, 450.0);
    }

    #[test]
    fn test_net_income_subtracts_feed_and_expenses() {
        let result = calculate_income(&sample_input());
        // 680 - (450 + 50)
        assert_eq!(result.net_income, 180.0);
        assert_eq!(result.expenses_total, 50.0);
    }

    #[test]
    fn test_production_cost_per_egg() {
        let result = calculate_income(&sample_input());

        // 1500 per sack -> 30/kg -> 0.03/g; 150 g of feed per duck
        assert!((result.production_cost.feed - 4.5).abs() < 1e-9);
        // 50 in expenses across 80 eggs
        assert!((result.production_cost.expenses - 0.625).abs() < 1e-9);
        assert!((result.production_cost.total - 5.125).abs() < 1e-9);
    }

    #[test]
    fn test_zero_production_has_no_expense_per_egg() {
        let mut input = sample_input();
        input.production_percent = 0.0;

        let result = calculate_income(&input);
        assert_eq!(result.total_eggs, 0.0);
        assert_eq!(result.production_cost.expenses, 0.0);
    }
}
