//! Live-data answers: run a canned query and render it as chat text.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use shonifity_core::CurrencyCode;

use super::intent::AnalyticsQuery;
use crate::db::{
    AnalyticsStore, CategoryCount, OrderSummary, ProductSummary, RepositoryError, UserSummary,
};

const RECENT_LIMIT: u32 = 5;

/// Analytics figures are catalog amounts, always USD.
const MONEY: &str = CurrencyCode::USD.symbol();

/// Raw result of an [`AnalyticsQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Count { description: String, value: i64 },
    Revenue { description: String, value: Decimal },
    Users { description: String, items: Vec<UserSummary> },
    Products { description: String, items: Vec<ProductSummary> },
    Orders { description: String, items: Vec<OrderSummary> },
    Categories { description: String, items: Vec<CategoryCount> },
}

/// Execute a query against the store.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn run(
    store: &dyn AnalyticsStore,
    query: AnalyticsQuery,
    now: DateTime<Utc>,
) -> Result<QueryResult, RepositoryError> {
    let result = match query {
        AnalyticsQuery::UserCount => QueryResult::Count {
            description: "Total number of registered users".to_string(),
            value: store.count_users().await?,
        },
        AnalyticsQuery::RecentUsers => QueryResult::Users {
            description: "Recent user registrations".to_string(),
            items: store.recent_users(RECENT_LIMIT).await?,
        },
        AnalyticsQuery::ProductCount => QueryResult::Count {
            description: "Total number of products in catalog".to_string(),
            value: store.count_products().await?,
        },
        AnalyticsQuery::FeaturedProducts => QueryResult::Products {
            description: "Featured products".to_string(),
            items: store.featured_products().await?,
        },
        AnalyticsQuery::ProductsByCategory => QueryResult::Categories {
            description: "Products by category".to_string(),
            items: store.products_by_category().await?,
        },
        AnalyticsQuery::RecentProducts => QueryResult::Products {
            description: "Recently added products".to_string(),
            items: store.recent_products(RECENT_LIMIT).await?,
        },
        AnalyticsQuery::OrderCount(timeframe) => QueryResult::Count {
            description: format!("Number of orders {}", timeframe.label()),
            value: store.count_orders(timeframe.since(now)).await?,
        },
        AnalyticsQuery::RecentOrders => QueryResult::Orders {
            description: "Recent orders".to_string(),
            items: store.recent_orders(RECENT_LIMIT).await?,
        },
        AnalyticsQuery::Revenue(timeframe) => QueryResult::Revenue {
            description: format!("Total revenue {}", timeframe.label()),
            value: store.revenue(timeframe.since(now)).await?,
        },
    };
    Ok(result)
}

/// Render a result as markdown-flavoured chat text.
#[must_use]
pub fn format_result(result: &QueryResult) -> String {
    match result {
        QueryResult::Count { description, value } => {
            format!("📊 **{description}**: **{}**", group_thousands(*value))
        }
        QueryResult::Revenue { description, value } => {
            format!("💰 **{description}**: **{MONEY}{}**", format_money(*value))
        }
        QueryResult::Users { description, items } => format_list(description, items, |u| {
            format!("**{}** ({}) - {}", u.name, u.email, short_date(u.created_at))
        }),
        QueryResult::Products { description, items } => format_list(description, items, |p| {
            format!("**{}** - {MONEY}{} ({})", p.name, p.price, p.category)
        }),
        QueryResult::Orders { description, items } => format_list(description, items, |o| {
            format!(
                "**{MONEY}{}** by {} - {}",
                o.total_amount,
                o.customer_name.as_deref().unwrap_or("Unknown"),
                short_date(o.created_at)
            )
        }),
        QueryResult::Categories { description, items } => {
            if items.is_empty() {
                return format!("📊 No {} found.", description.to_lowercase());
            }
            let mut out = format!("📊 **{description}**:\n\n");
            for (i, row) in items.iter().enumerate() {
                let _ = writeln!(out, "{}. **{}**: {} items", i + 1, row.category, row.count);
            }
            out
        }
    }
}

fn format_list<T>(description: &str, items: &[T], line: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return format!("📋 No {} found.", description.to_lowercase());
    }
    let mut out = format!("📋 **{description}** ({} items):\n\n", items.len());
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, line(item));
    }
    out
}

fn short_date(at: DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let cents = i64::try_from((rounded.abs() * Decimal::ONE_HUNDRED).trunc()).unwrap_or(i64::MAX);
    let sign = if rounded.is_sign_negative() { "-" } else { "" };
    format!("{sign}{}.{:02}", group_thousands(cents / 100), cents % 100)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use shonifity_core::UserRole;

    use super::*;
    use crate::db::{InMemoryStore, NewProduct, ProductStore};
    use crate::services::chatbot::intent::Timeframe;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-12_345), "-12,345");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::ZERO), "0.00");
        assert_eq!(format_money(Decimal::new(12_345, 1)), "1,234.50");
        assert_eq!(format_money(Decimal::new(99_999, 3)), "100.00");
    }

    #[test]
    fn test_format_count_and_revenue() {
        let count = QueryResult::Count {
            description: "Number of orders today".to_string(),
            value: 1_250,
        };
        assert_eq!(format_result(&count), "📊 **Number of orders today**: **1,250**");

        let revenue = QueryResult::Revenue {
            description: "Total revenue total".to_string(),
            value: Decimal::new(2_050_000, 2),
        };
        assert_eq!(format_result(&revenue), "💰 **Total revenue total**: **$20,500.00**");
    }

    #[test]
    fn test_format_lists() {
        let products = QueryResult::Products {
            description: "Featured products".to_string(),
            items: vec![ProductSummary {
                name: "Denim Jacket".to_string(),
                price: Decimal::new(8999, 2),
                category: "jackets".to_string(),
            }],
        };
        assert_eq!(
            format_result(&products),
            "📋 **Featured products** (1 items):\n\n1. **Denim Jacket** - $89.99 (jackets)\n"
        );

        let orders = QueryResult::Orders {
            description: "Recent orders".to_string(),
            items: vec![OrderSummary {
                total_amount: Decimal::new(13_000, 2),
                customer_name: None,
                created_at: Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap(),
            }],
        };
        assert_eq!(
            format_result(&orders),
            "📋 **Recent orders** (1 items):\n\n1. **$130.00** by Unknown - 3/7/2026\n"
        );

        let empty = QueryResult::Users {
            description: "Recent user registrations".to_string(),
            items: vec![],
        };
        assert_eq!(format_result(&empty), "📋 No recent user registrations found.");
    }

    #[test]
    fn test_format_categories() {
        let result = QueryResult::Categories {
            description: "Products by category".to_string(),
            items: vec![
                CategoryCount {
                    category: "shoes".to_string(),
                    count: 4,
                },
                CategoryCount {
                    category: "bags".to_string(),
                    count: 1,
                },
            ],
        };
        assert_eq!(
            format_result(&result),
            "📊 **Products by category**:\n\n1. **shoes**: 4 items\n2. **bags**: 1 items\n"
        );
    }

    #[tokio::test]
    async fn test_run_against_store() {
        let store = Arc::new(InMemoryStore::new());
        store.add_user("Ann", "ann@example.com", UserRole::Customer).await;
        store.add_user("Bo", "bo@example.com", UserRole::Admin).await;
        store
            .upsert(NewProduct {
                name: "Sneaker".to_string(),
                description: "Runs".to_string(),
                price: Decimal::new(60, 0),
                category: "shoes".to_string(),
                image: "sneaker.png".to_string(),
                is_featured: true,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let users = run(store.as_ref(), AnalyticsQuery::UserCount, now).await.unwrap();
        assert_eq!(
            users,
            QueryResult::Count {
                description: "Total number of registered users".to_string(),
                value: 2,
            }
        );

        let featured = run(store.as_ref(), AnalyticsQuery::FeaturedProducts, now)
            .await
            .unwrap();
        let QueryResult::Products { items, .. } = featured else {
            panic!("expected a product listing");
        };
        assert_eq!(items.len(), 1);

        let revenue = run(
            store.as_ref(),
            AnalyticsQuery::Revenue(Timeframe::Today),
            now,
        )
        .await
        .unwrap();
        assert_eq!(
            format_result(&revenue),
            "💰 **Total revenue today**: **$0.00**"
        );
    }
}
