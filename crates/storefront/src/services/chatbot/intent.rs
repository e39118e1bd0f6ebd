//! Keyword-based intent classification.
//!
//! Classification is a pure function of the message text. A message becomes
//! a live-data request only when it contains a data keyword *and* resolves to
//! one of the canned [`AnalyticsQuery`] variants; everything else is general
//! chat.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

const DATA_KEYWORDS: &[&str] = &[
    "how many",
    "count",
    "total",
    "revenue",
    "sales",
    "orders",
    "customers",
    "products",
    "inventory",
    "analytics",
    "dashboard",
    "report",
    "today",
    "yesterday",
    "this week",
    "this month",
    "recent",
    "latest",
    "top selling",
    "best",
    "featured",
    "category",
    "price",
];

/// What the message is about, checked in this order.
const SUBJECT_KEYWORDS: &[(Subject, &[&str])] = &[
    (Subject::Users, &["users", "customers", "accounts", "members"]),
    (Subject::Products, &["products", "items", "inventory", "catalog"]),
    (Subject::Orders, &["orders", "sales", "purchases", "transactions"]),
    (Subject::Revenue, &["revenue", "money", "earnings", "income", "profit"]),
];

/// Result of classifying a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Answer from live store data.
    Data(AnalyticsQuery),
    /// Answer from the knowledge base.
    General,
}

/// Reporting window for counts and revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    /// Since midnight UTC.
    Today,
    /// Since midnight UTC of the most recent Sunday.
    ThisWeek,
    /// All time.
    Total,
}

impl Timeframe {
    fn detect(message: &str) -> Self {
        if message.contains("today") {
            Self::Today
        } else if message.contains("this week") {
            Self::ThisWeek
        } else {
            Self::Total
        }
    }

    /// Lower bound of the window, `None` for all time.
    #[must_use]
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let start = match self {
            Self::Today => today,
            Self::ThisWeek => {
                today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
            }
            Self::Total => return None,
        };
        Some(start.and_time(NaiveTime::MIN).and_utc())
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::ThisWeek => "this week",
            Self::Total => "total",
        }
    }
}

/// The canned read-only queries the chatbot can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsQuery {
    UserCount,
    RecentUsers,
    ProductCount,
    FeaturedProducts,
    ProductsByCategory,
    RecentProducts,
    OrderCount(Timeframe),
    RecentOrders,
    Revenue(Timeframe),
}

impl AnalyticsQuery {
    /// Entity the query reads, shown to the user as the executed intent.
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::UserCount | Self::RecentUsers => "user",
            Self::ProductCount
            | Self::FeaturedProducts
            | Self::ProductsByCategory
            | Self::RecentProducts => "product",
            Self::OrderCount(_) | Self::RecentOrders => "order",
            Self::Revenue(_) => "revenue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Users,
    Products,
    Orders,
    Revenue,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify a chat message.
#[must_use]
pub fn classify(message: &str) -> Intent {
    let message = message.to_lowercase();
    if !contains_any(&message, DATA_KEYWORDS) {
        return Intent::General;
    }

    let subject = SUBJECT_KEYWORDS
        .iter()
        .find(|(_, words)| contains_any(&message, words))
        .map(|(subject, _)| *subject);

    resolve(&message, subject).map_or(Intent::General, Intent::Data)
}

fn resolve(message: &str, subject: Option<Subject>) -> Option<AnalyticsQuery> {
    let is = |s: Subject| subject == Some(s);
    let counting = contains_any(message, &["how many", "count"]);
    let recent = contains_any(message, &["recent", "latest"]);

    if is(Subject::Users) || contains_any(message, &["user", "customer"]) {
        if counting {
            return Some(AnalyticsQuery::UserCount);
        }
        if recent {
            return Some(AnalyticsQuery::RecentUsers);
        }
    }

    if is(Subject::Products) || message.contains("product") {
        if counting {
            return Some(AnalyticsQuery::ProductCount);
        }
        if message.contains("featured") {
            return Some(AnalyticsQuery::FeaturedProducts);
        }
        if message.contains("categor") {
            return Some(AnalyticsQuery::ProductsByCategory);
        }
        if recent {
            return Some(AnalyticsQuery::RecentProducts);
        }
    }

    if is(Subject::Orders) || contains_any(message, &["order", "sale"]) {
        if counting {
            return Some(AnalyticsQuery::OrderCount(Timeframe::detect(message)));
        }
        if recent {
            return Some(AnalyticsQuery::RecentOrders);
        }
    }

    if is(Subject::Revenue) || contains_any(message, &["revenue", "money"]) {
        return Some(AnalyticsQuery::Revenue(Timeframe::detect(message)));
    }

    None
}
