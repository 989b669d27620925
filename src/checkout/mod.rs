//! Paid flows: membership dues and event registrations.
//!
//! The confirm endpoints and the Stripe webhook both end in
//! [`apply_intent`], so a payment is applied the same way whichever
//! arrives first, and only once.

use chrono::{DateTime, Duration, Utc};

use crate::db::NewRegistration;
use crate::errors::AppError;
use crate::mail::{self, send_best_effort};
use crate::models::{
    Member, MembershipCheckout, MembershipStatus, Registration, RegistrationCheckout,
    RegistrationStatus, SignupRequest,
};
use crate::payments::{NewIntent, PaymentIntent, PaymentPurpose};
use crate::pricing::{membership_dues, resolve_price, PriceQuote};
use crate::AppState;

/// Trim an optional text field, treating blank as absent.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Minimal shape check; deliverability is the mail relay's problem.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("A valid email address is required".to_string()))
    }
}

fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Look up the member a registrant claims to be, by id first and then by email.
///
/// When an email is given a member id only counts if it belongs to that email,
/// so a leaked id cannot buy member pricing for someone else.
async fn find_registrant(
    state: &AppState,
    member_id: Option<&str>,
    email: Option<&str>,
) -> Result<Option<Member>, AppError> {
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    if let Some(id) = member_id.filter(|id| !id.trim().is_empty()) {
        if let Some(member) = state.repo.get_member(id.trim()).await? {
            match email {
                Some(email) if !member.email.eq_ignore_ascii_case(email) => {
                    tracing::warn!(member_id = %member.id, "Member id does not match registrant email");
                }
                _ => return Ok(Some(member)),
            }
        }
    }
    match email {
        Some(email) => state.repo.find_member_by_email(email).await,
        None => Ok(None),
    }
}

/// Price an event for a prospective registrant.
pub async fn quote(
    state: &AppState,
    event_id: &str,
    member_id: Option<&str>,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PriceQuote, AppError> {
    let event = state
        .repo
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;
    let member = find_registrant(state, member_id, email).await?;
    let (pricing_tier, price_cents) = resolve_price(&event, member.as_ref(), now);

    Ok(PriceQuote {
        event_id: event.id,
        member_id: member
            .filter(|m| m.is_active_at(now))
            .map(|m| m.id),
        pricing_tier,
        price_cents,
        currency: state.config.currency.clone(),
    })
}

// -- memberships ------------------------------------------------------------

/// Create a pending member and the intent for their first year of dues.
pub async fn signup(
    state: &AppState,
    request: &SignupRequest,
    now: DateTime<Utc>,
) -> Result<MembershipCheckout, AppError> {
    require(&request.first_name, "First name")?;
    require(&request.last_name, "Last name")?;
    validate_email(&request.email)?;

    let request = SignupRequest {
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        email: request.email.trim().to_string(),
        role: request.role,
        credential: clean(&request.credential),
        bacb_certification_number: clean(&request.bacb_certification_number),
        organization: clean(&request.organization),
        phone: clean(&request.phone),
    };

    let member = state.repo.create_member(&request, now).await?;
    tracing::info!(member_id = %member.id, role = member.role.as_str(), "Member signed up");
    dues_checkout(state, member, now).await
}

/// Start a renewal for an existing member.
pub async fn renew(
    state: &AppState,
    member_id: &str,
    now: DateTime<Utc>,
) -> Result<MembershipCheckout, AppError> {
    let member = state
        .repo
        .get_member(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?;
    if member.status == MembershipStatus::Cancelled {
        return Err(AppError::InvalidState(
            "Cancelled memberships cannot be renewed online".to_string(),
        ));
    }
    dues_checkout(state, member, now).await
}

async fn dues_checkout(
    state: &AppState,
    member: Member,
    now: DateTime<Utc>,
) -> Result<MembershipCheckout, AppError> {
    let intent = state
        .payments
        .create_intent(&NewIntent {
            amount_cents: membership_dues(member.role),
            currency: &state.config.currency,
            purpose: PaymentPurpose::Membership,
            target_id: &member.id,
            description: format!("ArkABA {} membership", member.role.as_str()),
            receipt_email: Some(&member.email),
        })
        .await?;
    let payment = intent.instructions()?;
    let member = state
        .repo
        .set_member_payment_intent(&member.id, &intent.id, now)
        .await?;
    Ok(MembershipCheckout { member, payment })
}

/// Confirm a dues payment the browser reports as complete.
pub async fn confirm_membership(
    state: &AppState,
    member_id: &str,
    payment_intent_id: &str,
    now: DateTime<Utc>,
) -> Result<Member, AppError> {
    let intent = state.payments.retrieve_intent(payment_intent_id).await?;
    if !intent.is_for(PaymentPurpose::Membership, member_id) {
        return Err(AppError::Validation(
            "Payment does not belong to this member".to_string(),
        ));
    }
    apply_membership(state, member_id, &intent, now).await
}

async fn apply_membership(
    state: &AppState,
    member_id: &str,
    intent: &PaymentIntent,
    now: DateTime<Utc>,
) -> Result<Member, AppError> {
    if !intent.succeeded() {
        return Err(AppError::PaymentRequired(
            "Dues payment has not completed".to_string(),
        ));
    }

    let (member, applied) = state
        .repo
        .activate_membership(member_id, &intent.id, state.config.membership_term_days, now)
        .await?;

    // Only the call that applied the payment sends the welcome.
    if applied {
        send_best_effort(
            state.mailer.as_ref(),
            mail::membership_welcome(&member, intent.amount, &intent.currency),
        )
        .await;
    }
    Ok(member)
}

// -- registrations ----------------------------------------------------------

/// Register for an event. Free seats are confirmed at once; paid seats are
/// held while the registrant pays.
pub async fn register(
    state: &AppState,
    event_id: &str,
    name: &str,
    email: &str,
    member_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RegistrationCheckout, AppError> {
    require(name, "Name")?;
    validate_email(email)?;

    let event = state
        .repo
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;
    if !event.registration_open {
        return Err(AppError::InvalidState(
            "Registration for this event is closed".to_string(),
        ));
    }
    if event.has_started(now) {
        return Err(AppError::InvalidState("This event has already started".to_string()));
    }

    let member = find_registrant(state, member_id, Some(email)).await?;
    let (pricing_tier, price_cents) = resolve_price(&event, member.as_ref(), now);
    let free = price_cents == 0;

    let new = NewRegistration {
        event_id: event.id.clone(),
        member_id: member.filter(|m| m.is_active_at(now)).map(|m| m.id),
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        pricing_tier,
        price_cents,
        status: if free {
            RegistrationStatus::Confirmed
        } else {
            RegistrationStatus::PendingPayment
        },
        hold_expires_at: (!free)
            .then(|| now + Duration::minutes(state.config.registration_hold_minutes)),
    };
    let registration = state.repo.create_registration(&new, now).await?;

    tracing::info!(
        registration_id = %registration.id,
        event_id = %event.id,
        tier = %registration.pricing_tier,
        price_cents,
        "Registration created"
    );

    if free {
        send_best_effort(
            state.mailer.as_ref(),
            mail::registration_confirmation(&registration, &event, &state.config.currency),
        )
        .await;
        return Ok(RegistrationCheckout {
            registration,
            payment: None,
        });
    }

    let intent = state
        .payments
        .create_intent(&NewIntent {
            amount_cents: price_cents,
            currency: &state.config.currency,
            purpose: PaymentPurpose::Registration,
            target_id: &registration.id,
            description: format!("Registration: {}", event.title),
            receipt_email: Some(&registration.email),
        })
        .await;

    let attached = match intent {
        Ok(intent) => match intent.instructions() {
            Ok(payment) => state
                .repo
                .set_registration_intent(&registration.id, &intent.id, now)
                .await
                .map(|registration| (registration, payment)),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    match attached {
        Ok((registration, payment)) => Ok(RegistrationCheckout {
            registration,
            payment: Some(payment),
        }),
        Err(e) => {
            // Give the seat back; the registrant can retry.
            if let Err(release) = state
                .repo
                .transition_registration(
                    &registration.id,
                    &[RegistrationStatus::PendingPayment],
                    RegistrationStatus::Cancelled,
                    now,
                )
                .await
            {
                tracing::error!(
                    registration_id = %registration.id,
                    error = %release,
                    "Failed to release seat after payment setup failed"
                );
            }
            Err(e)
        }
    }
}

/// Confirm a registration payment the browser reports as complete.
pub async fn confirm_registration(
    state: &AppState,
    registration_id: &str,
    now: DateTime<Utc>,
) -> Result<Registration, AppError> {
    let registration = state
        .repo
        .get_registration(registration_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Registration {} not found", registration_id))
        })?;

    match registration.status {
        RegistrationStatus::Confirmed | RegistrationStatus::Attended => return Ok(registration),
        RegistrationStatus::PendingPayment | RegistrationStatus::Cancelled => {}
    }

    let Some(intent_id) = registration.payment_intent_id.as_deref() else {
        return Err(AppError::InvalidState(
            "Registration has no payment to confirm".to_string(),
        ));
    };
    let intent = state.payments.retrieve_intent(intent_id).await?;
    if !intent.is_for(PaymentPurpose::Registration, registration_id) {
        return Err(AppError::Validation(
            "Payment does not belong to this registration".to_string(),
        ));
    }
    apply_registration(state, registration, &intent, now).await
}

async fn apply_registration(
    state: &AppState,
    registration: Registration,
    intent: &PaymentIntent,
    now: DateTime<Utc>,
) -> Result<Registration, AppError> {
    if !intent.succeeded() {
        return Err(AppError::PaymentRequired(
            "Registration payment has not completed".to_string(),
        ));
    }

    let (confirmed, newly_confirmed) = state
        .repo
        .confirm_registration_payment(&registration.id, &intent.id, now)
        .await?;

    if newly_confirmed {
        if let Some(event) = state.repo.get_event(&confirmed.event_id).await? {
            send_best_effort(
                state.mailer.as_ref(),
                mail::registration_confirmation(&confirmed, &event, &state.config.currency),
            )
            .await;
        }
    }
    Ok(confirmed)
}

/// Self-service cancellation. The caller must know the registration email.
pub async fn cancel_registration(
    state: &AppState,
    registration_id: &str,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Registration, AppError> {
    let registration = state
        .repo
        .get_registration(registration_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Registration {} not found", registration_id))
        })?;

    if let Some(email) = email {
        if !registration.email.eq_ignore_ascii_case(email.trim()) {
            // Same answer as a missing id so guessing ids reveals nothing.
            return Err(AppError::NotFound(format!(
                "Registration {} not found",
                registration_id
            )));
        }
    }

    let cancelled = state
        .repo
        .transition_registration(
            registration_id,
            &[
                RegistrationStatus::PendingPayment,
                RegistrationStatus::Confirmed,
            ],
            RegistrationStatus::Cancelled,
            now,
        )
        .await?;

    if let Some(event) = state.repo.get_event(&cancelled.event_id).await? {
        send_best_effort(
            state.mailer.as_ref(),
            mail::registration_cancelled(&cancelled, &event),
        )
        .await;
    }
    Ok(cancelled)
}

// -- webhook ----------------------------------------------------------------

/// What a webhook delivery ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Membership(String),
    Registration(String),
    /// Intent carried no metadata this site recognizes
    Ignored,
}

/// Apply a succeeded intent reported by the gateway.
pub async fn apply_intent(
    state: &AppState,
    intent: &PaymentIntent,
    now: DateTime<Utc>,
) -> Result<Applied, AppError> {
    let Some((purpose, target_id)) = intent.target() else {
        // Metadata can be edited away in the dashboard; the stored intent id still matches.
        if let Some(registration) = state.repo.find_registration_by_intent(&intent.id).await? {
            let id = registration.id.clone();
            apply_registration(state, registration, intent, now).await?;
            return Ok(Applied::Registration(id));
        }
        tracing::info!(payment_intent_id = %intent.id, "Ignoring intent without site metadata");
        return Ok(Applied::Ignored);
    };

    match purpose {
        PaymentPurpose::Membership => {
            apply_membership(state, target_id, intent, now).await?;
            Ok(Applied::Membership(target_id.to_string()))
        }
        PaymentPurpose::Registration => {
            let registration = state
                .repo
                .get_registration(target_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Registration {} not found", target_id))
                })?;
            apply_registration(state, registration, intent, now).await?;
            Ok(Applied::Registration(target_id.to_string()))
        }
    }
}
