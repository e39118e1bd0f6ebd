//! Knowledge base for general questions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ChatbotError;

const FALLBACK_TOPIC: &str = "company";
const MAX_RELEVANT: usize = 3;
const SHORT_QUERY_SUGGESTIONS: usize = 4;
const UNMATCHED_SUGGESTIONS: usize = 3;

/// One knowledge base entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub topic: String,
    pub content: String,
    /// Extra words that tie a question to this topic.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Documents plus canned suggestions, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub documents: Vec<KnowledgeDoc>,
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,
}

impl KnowledgeBase {
    /// Load a knowledge base from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds no documents.
    pub fn from_file(path: &Path) -> Result<Self, ChatbotError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ChatbotError::KnowledgeFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let base: Self = serde_json::from_str(&raw).map_err(|e| ChatbotError::KnowledgeFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if base.documents.is_empty() {
            return Err(ChatbotError::KnowledgeFile {
                path: path.display().to_string(),
                reason: "no documents".to_string(),
            });
        }
        Ok(base)
    }

    /// Up to three documents ranked by relevance to the query.
    ///
    /// A topic named in the query scores 3, each query word (longer than two
    /// characters) found in the content scores 1 and each topic keyword in the
    /// query scores 2. With no positive score the `company` document (or the
    /// first one) is returned alone.
    #[must_use]
    pub fn find_relevant(&self, query: &str) -> Vec<&KnowledgeDoc> {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 2).collect();

        let mut scored: Vec<(usize, &KnowledgeDoc)> = self
            .documents
            .iter()
            .map(|doc| {
                let content = doc.content.to_lowercase();
                let mut score = 0;
                if query.contains(&doc.topic.to_lowercase()) {
                    score += 3;
                }
                score += words.iter().filter(|w| content.contains(**w)).count();
                score += 2 * doc
                    .keywords
                    .iter()
                    .filter(|k| query.contains(&k.to_lowercase()))
                    .count();
                (score, doc)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps document order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let relevant: Vec<&KnowledgeDoc> = scored
            .into_iter()
            .take(MAX_RELEVANT)
            .map(|(_, doc)| doc)
            .collect();

        if relevant.is_empty() {
            return self
                .documents
                .iter()
                .find(|d| d.topic == FALLBACK_TOPIC)
                .or_else(|| self.documents.first())
                .into_iter()
                .collect();
        }
        relevant
    }

    /// Suggested questions for a partially typed query.
    #[must_use]
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < 3 {
            return self.suggestions.iter().take(SHORT_QUERY_SUGGESTIONS).cloned().collect();
        }

        let matching: Vec<String> = self
            .suggestions
            .iter()
            .filter(|s| s.to_lowercase().contains(&query))
            .cloned()
            .collect();
        if matching.is_empty() {
            self.suggestions.iter().take(UNMATCHED_SUGGESTIONS).cloned().collect()
        } else {
            matching
        }
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            documents: builtin_documents(),
            suggestions: default_suggestions(),
        }
    }
}

fn default_suggestions() -> Vec<String> {
    [
        "Tell me about your products",
        "What's your return policy?",
        "How much is shipping?",
        "What payment methods do you accept?",
        "How do I track my order?",
        "Do you have customer support?",
        "What currencies do you support?",
        "How do I create an account?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn doc(topic: &str, content: &str, keywords: &[&str]) -> KnowledgeDoc {
    KnowledgeDoc {
        topic: topic.to_string(),
        content: content.to_string(),
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
    }
}

fn builtin_documents() -> Vec<KnowledgeDoc> {
    vec![
        doc(
            "products",
            "Shonifity sells clothing, shoes, bags and accessories. Every product page lists \
             its category, price and photos, and featured picks rotate on the home page.",
            &["products", "items", "buy", "purchase", "shop", "sell"],
        ),
        doc(
            "shipping",
            "Standard shipping takes 3-7 business days and express shipping 1-2 business days. \
             Tracking details are emailed as soon as an order leaves the warehouse.",
            &["delivery", "ship", "send", "fast", "free", "cost", "track"],
        ),
        doc(
            "returns",
            "Unworn items can be returned within 30 days of delivery for a full refund to the \
             original payment method. Exchanges for another size are free.",
            &["return", "refund", "exchange", "money back"],
        ),
        doc(
            "payment",
            "Checkout is handled by Stripe and accepts all major credit and debit cards. \
             Prices are shown in USD, EUR, GBP, CAD, AUD or INR and charged in USD.",
            &["pay", "credit", "card", "checkout", "billing", "currencies", "currency"],
        ),
        doc(
            "support",
            "Customer support is available by email and live chat every day from 9am to 9pm. \
             Most questions are answered within a few hours.",
            &["help", "contact", "customer", "service", "assistance"],
        ),
        doc(
            "account",
            "Creating an account saves your cart across devices, lists your past orders and \
             holds any gift coupons you have earned.",
            &["login", "register", "profile", "membership", "signup", "sign up"],
        ),
        doc(
            "company",
            "Shonifity is an online fashion store focused on quality basics, fair prices and \
             friendly service.",
            &[],
        ),
        doc(
            "deals",
            "Orders of $200 or more earn a 10% gift coupon for the next purchase, valid for \
             30 days. Apply the coupon code at checkout.",
            &["discount", "sale", "offer", "coupon", "deal", "promo"],
        ),
        doc(
            "quality",
            "Every item is inspected before it ships and is covered by a one-year guarantee \
             against manufacturing defects.",
            &["quality", "guarantee", "warranty", "authentic"],
        ),
        doc(
            "technology",
            "The store offers personalised recommendations, category browsing and an \
             assistant that can answer questions about orders and the catalog.",
            &["recommend", "assistant", "chatbot"],
        ),
    ]
}
