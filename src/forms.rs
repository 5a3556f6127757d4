//! Visitor forms and the thank-you emails they trigger.

use serde::Deserialize;

const SIGNATURE: &str = "Islands of Bharath Team";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThankYouEmail {
    pub to: String,
    pub subject: &'static str,
    pub body: String,
}

pub trait ThankYou {
    fn thank_you(&self) -> ThankYouEmail;

    /// Page shown once the email has gone out.
    fn redirect_to(&self) -> &'static str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnquiryForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl ThankYou for EnquiryForm {
    fn thank_you(&self) -> ThankYouEmail {
        ThankYouEmail {
            to: self.email.clone(),
            subject: "Thank you for your enquiry!",
            body: format!(
                "Dear {},\n\nThank you for your enquiry about \"{}\". We have received your message:\n\"{}\"\n\nWe will get back to you soon!\n\n{}",
                self.name, self.subject, self.message, SIGNATURE
            ),
        }
    }

    fn redirect_to(&self) -> &'static str {
        "/enquiry-thankyou.html"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub island: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub review: String,
}

impl ThankYou for ReviewForm {
    fn thank_you(&self) -> ThankYouEmail {
        ThankYouEmail {
            to: self.email.clone(),
            subject: "Thank you for your review!",
            body: format!(
                "Dear {},\n\nThank you for reviewing {} and giving a rating of {} stars.\nYour review:\n\"{}\"\n\nWe appreciate your feedback!\n\n{}",
                self.name, self.island, self.rating, self.review, SIGNATURE
            ),
        }
    }

    fn redirect_to(&self) -> &'static str {
        "/review-thankyou.html"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackForm {
    pub name: String,
    pub email: String,
    #[serde(rename = "feedbackType", default)]
    pub feedback_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub feedback: String,
}

impl ThankYou for FeedbackForm {
    fn thank_you(&self) -> ThankYouEmail {
        ThankYouEmail {
            to: self.email.clone(),
            subject: "Thank you for your feedback!",
            body: format!(
                "Dear {},\n\nThank you for your {} on {}.\nYour feedback:\n\"{}\"\n\nWe value your input!\n\n{}",
                self.name, self.feedback_type, self.category, self.feedback, SIGNATURE
            ),
        }
    }

    fn redirect_to(&self) -> &'static str {
        "/feedback-thankyou.html"
    }
}
