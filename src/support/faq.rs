//! Direct answers the router may give without a specialist

/// Store hours
pub const HOURS: &str = "We're open 24/7 online, customer service available 9 AM - 6 PM EST.";
/// Shipping policy
pub const SHIPPING: &str =
    "Free shipping on orders over $50, standard shipping takes 3-5 business days.";
/// Return policy
pub const RETURNS: &str = "We have a 30-day return policy for most items, some exclusions apply.";
/// Accepted payment methods
pub const PAYMENT: &str = "We accept Visa, Mastercard, Amex, PayPal, and Apple Pay.";
/// Reply to a greeting
pub const GREETING: &str = "Hello! How can I help you today? I can check orders, handle refunds and help with product issues.";
/// Reply to thanks or goodbye
pub const THANKS: &str = "You're welcome! Let me know if there's anything else I can help with.";
/// Answer when nothing matches
pub const CLARIFY: &str = "Could you tell me a bit more? For order questions, please include your order ID (for example ORD-2024-001).";

/// A direct answer and the phrases that trigger it
#[derive(Debug)]
pub struct FaqAnswer {
    /// Topic shown in the router instructions
    pub topic: &'static str,
    /// Trigger phrases for keyword routing
    pub keywords: &'static [&'static str],
    /// Answer text
    pub answer: &'static str,
    /// Whether the router instructions quote the answer
    pub quoted: bool,
}

/// All direct answers, checked in order
pub static FAQ: &[FaqAnswer] = &[
    FaqAnswer {
        topic: "Store hours",
        keywords: &["hours", "open", "opening", "closing", "when are you"],
        answer: HOURS,
        quoted: true,
    },
    FaqAnswer {
        topic: "Shipping policy",
        keywords: &["shipping", "delivery time", "ship"],
        answer: SHIPPING,
        quoted: true,
    },
    FaqAnswer {
        topic: "Return policy",
        keywords: &["return policy", "returns policy"],
        answer: RETURNS,
        quoted: true,
    },
    FaqAnswer {
        topic: "Payment methods",
        keywords: &["payment", "pay", "visa", "mastercard", "paypal", "apple pay"],
        answer: PAYMENT,
        quoted: true,
    },
    FaqAnswer {
        topic: "Thank you messages and goodbyes",
        keywords: &["thanks", "thank you", "bye", "goodbye"],
        answer: THANKS,
        quoted: false,
    },
    FaqAnswer {
        topic: "Greetings and general conversation",
        keywords: &["hi", "hello", "hey", "good morning", "good evening"],
        answer: GREETING,
        quoted: false,
    },
];

/// Bullet list of direct answers for the router instructions
#[must_use]
pub fn direct_guidance() -> String {
    FAQ.iter()
        .map(|faq| {
            if faq.quoted {
                format!("- {}: \"{}\"", faq.topic, faq.answer)
            } else {
                format!("- {}", faq.topic)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guidance_lists_every_topic() {
        let guidance = direct_guidance();
        assert_eq!(guidance.lines().count(), FAQ.len());
        assert!(guidance.contains(HOURS));
        assert!(guidance.contains("- Greetings and general conversation"));
        assert!(!guidance.contains(GREETING));
    }
}
