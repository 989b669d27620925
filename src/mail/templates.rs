//! Message bodies for the site's transactional mail.

use chrono::{DateTime, Utc};

use super::Email;
use crate::models::{ContactRequest, Event, Member, Registration};

/// Render an amount in minor units, e.g. `$75.00` or `75.00 EUR`.
pub fn format_amount(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let amount = format!("{}.{:02}", abs / 100, abs % 100);
    if currency.eq_ignore_ascii_case("usd") {
        format!("{}${}", sign, amount)
    } else {
        format!("{}{} {}", sign, amount, currency.to_ascii_uppercase())
    }
}

fn format_date(t: DateTime<Utc>) -> String {
    t.format("%B %-d, %Y at %H:%M UTC").to_string()
}

pub fn membership_welcome(member: &Member, amount_cents: i64, currency: &str) -> Email {
    let expires = member
        .membership_expires_at
        .map(|t| t.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| "the end of your term".to_string());

    Email {
        to: member.email.clone(),
        subject: "Welcome to ArkABA".to_string(),
        text: format!(
            "Hi {},\n\n\
             Thank you for joining the Arkansas Association for Behavior Analysis as a {} member.\n\
             We received your dues payment of {}. Your membership is active through {}.\n\n\
             ArkABA",
            member.first_name,
            member.role.as_str(),
            format_amount(amount_cents, currency),
            expires
        ),
        reply_to: None,
    }
}

pub fn registration_confirmation(
    registration: &Registration,
    event: &Event,
    currency: &str,
) -> Email {
    let paid = if registration.price_cents > 0 {
        format!(
            "Amount paid: {} ({} rate).\n",
            format_amount(registration.price_cents, currency),
            registration.pricing_tier
        )
    } else {
        String::new()
    };
    let ceus = event
        .ceu_credits
        .map(|c| format!("This event offers {} CEUs.\n", c))
        .unwrap_or_default();

    Email {
        to: registration.email.clone(),
        subject: format!("You're registered: {}", event.title),
        text: format!(
            "Hi {},\n\n\
             Your registration for {} is confirmed.\n\
             When: {}\n\
             Where: {}\n\
             {}{}\n\
             Registration id: {}\n\n\
             ArkABA",
            registration.name,
            event.title,
            format_date(event.starts_at),
            event.location,
            paid,
            ceus,
            registration.id
        ),
        reply_to: None,
    }
}

pub fn registration_cancelled(registration: &Registration, event: &Event) -> Email {
    Email {
        to: registration.email.clone(),
        subject: format!("Registration cancelled: {}", event.title),
        text: format!(
            "Hi {},\n\n\
             Your registration for {} on {} has been cancelled.\n\
             If this was a mistake, you can register again while seats remain.\n\n\
             ArkABA",
            registration.name,
            event.title,
            format_date(event.starts_at)
        ),
        reply_to: None,
    }
}

pub fn contact_forward(request: &ContactRequest, admin_email: &str) -> Email {
    let subject = request
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Website inquiry");

    Email {
        to: admin_email.to_string(),
        subject: format!("[Contact] {}", subject),
        text: format!(
            "From: {} <{}>\n\n{}",
            request.name.trim(),
            request.email.trim(),
            request.message.trim()
        ),
        reply_to: Some(request.email.trim().to_string()),
    }
}
