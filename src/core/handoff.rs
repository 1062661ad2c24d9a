//! Negotiation access rules and checkpoint handoff sequencing
//!
//! Everything here is a pure decision over already-loaded rows; persistence
//! and the HTTP mapping live in `services` and `routes`.

use thiserror::Error;

use crate::models::{Checkpoint, CheckpointType, Negotiation, NegotiationMessage, NegotiationStatus};

/// Rejected negotiation or checkpoint operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("user {0} is not a party to this negotiation")]
    NotParty(i64),

    #[error("only the {0} may perform this action")]
    WrongRole(&'static str),

    #[error("negotiation is no longer active")]
    NotActive,

    #[error("no professional has been assigned to this negotiation")]
    NoProfessional,

    #[error("the professional must be confirmed first")]
    ProfessionalNotConfirmed,

    #[error("the professional was already confirmed")]
    AlreadyConfirmed,

    #[error("checkpoint {0} has not been scanned yet")]
    PrerequisiteNotScanned(CheckpointType),

    #[error("this checkpoint was already scanned")]
    AlreadyScanned,

    #[error("user {0} may not scan this checkpoint")]
    ScanNotPermitted(i64),
}

impl HandoffError {
    /// Authorization failures as opposed to invalid state transitions
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            HandoffError::NotParty(_) | HandoffError::WrongRole(_) | HandoffError::ScanNotPermitted(_)
        )
    }
}

/// A user's relationship to a negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Party {
    pub initiator: bool,
    pub recipient: bool,
    pub professional: bool,
}

impl Party {
    /// Resolve the roles of `user_id`, whose professional profile id is
    /// `professional_id` when they have one
    pub fn resolve(negotiation: &Negotiation, user_id: i64, professional_id: Option<i64>) -> Self {
        Self {
            initiator: negotiation.initiator_id == user_id,
            recipient: negotiation.recipient_id == user_id,
            professional: professional_id.is_some() && negotiation.professional_id == professional_id,
        }
    }

    pub fn is_party(&self) -> bool {
        self.initiator || self.recipient || self.professional
    }
}

/// Initiator, recipient or assigned professional may view and message
pub fn ensure_party(party: Party, user_id: i64) -> Result<(), HandoffError> {
    if party.is_party() {
        Ok(())
    } else {
        Err(HandoffError::NotParty(user_id))
    }
}

/// Messages and responses require an active thread
pub fn ensure_active(negotiation: &Negotiation) -> Result<(), HandoffError> {
    if negotiation.status == NegotiationStatus::Active {
        Ok(())
    } else {
        Err(HandoffError::NotActive)
    }
}

/// Accept and reject: recipient only, active only
pub fn ensure_can_respond(negotiation: &Negotiation, party: Party) -> Result<(), HandoffError> {
    if !party.recipient {
        return Err(HandoffError::WrongRole("recipient"));
    }
    ensure_active(negotiation)
}

/// Assigning a professional is open to both renter and owner
pub fn ensure_can_assign_professional(party: Party) -> Result<(), HandoffError> {
    if party.initiator || party.recipient {
        Ok(())
    } else {
        Err(HandoffError::WrongRole("renter or owner"))
    }
}

/// Confirming the assigned professional: initiator only, exactly once
pub fn ensure_can_confirm_professional(negotiation: &Negotiation, party: Party) -> Result<(), HandoffError> {
    if !party.initiator {
        return Err(HandoffError::WrongRole("renter"));
    }
    if negotiation.professional_id.is_none() {
        return Err(HandoffError::NoProfessional);
    }
    if negotiation.professional_confirmed {
        return Err(HandoffError::AlreadyConfirmed);
    }
    Ok(())
}

/// Mark what `reader_id` received as read
///
/// Returns the ids that changed; the reader's own messages are untouched.
pub fn mark_read(messages: &mut [NegotiationMessage], reader_id: i64) -> Vec<i64> {
    messages
        .iter_mut()
        .filter(|m| m.sender_id != reader_id && !m.is_read)
        .map(|m| {
            m.is_read = true;
            m.id
        })
        .collect()
}

/// Who may generate a checkpoint of `kind`, and what must already have happened
///
/// `existing` holds the negotiation's checkpoints in any order.
pub fn ensure_can_generate(
    kind: CheckpointType,
    negotiation: &Negotiation,
    party: Party,
    existing: &[Checkpoint],
) -> Result<(), HandoffError> {
    let scanned = |wanted: CheckpointType| existing.iter().any(|c| c.kind == wanted && c.is_scanned());

    match kind {
        CheckpointType::DeliveryToProfessional => {
            if !party.initiator {
                return Err(HandoffError::WrongRole("renter"));
            }
            if !negotiation.professional_confirmed {
                return Err(HandoffError::ProfessionalNotConfirmed);
            }
        }
        CheckpointType::ReturnFromProfessional => {
            if !party.professional {
                return Err(HandoffError::WrongRole("professional"));
            }
            if !scanned(CheckpointType::DeliveryToProfessional) {
                return Err(HandoffError::PrerequisiteNotScanned(CheckpointType::DeliveryToProfessional));
            }
        }
        CheckpointType::ReturnToOwner => {
            if !party.initiator {
                return Err(HandoffError::WrongRole("renter"));
            }
            if negotiation.professional_id.is_some() && !scanned(CheckpointType::ReturnFromProfessional) {
                return Err(HandoffError::PrerequisiteNotScanned(CheckpointType::ReturnFromProfessional));
            }
        }
    }

    Ok(())
}

/// The receiving side of each handoff is the one who scans
pub fn ensure_can_scan(checkpoint: &Checkpoint, party: Party, user_id: i64) -> Result<(), HandoffError> {
    if checkpoint.is_scanned() {
        return Err(HandoffError::AlreadyScanned);
    }

    let permitted = match checkpoint.kind {
        CheckpointType::DeliveryToProfessional => party.professional,
        CheckpointType::ReturnFromProfessional => party.initiator,
        CheckpointType::ReturnToOwner => party.recipient,
    };

    if permitted {
        Ok(())
    } else {
        Err(HandoffError::ScanNotPermitted(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckpointStatus, NegotiationType};
    use chrono::Utc;
    use uuid::Uuid;

    const RENTER: i64 = 1;
    const OWNER: i64 = 2;
    const TAILOR_USER: i64 = 3;
    const TAILOR: i64 = 30;

    fn negotiation(professional_id: Option<i64>, confirmed: bool) -> Negotiation {
        Negotiation {
            id: 10,
            clothing_item_id: 5,
            initiator_id: RENTER,
            recipient_id: OWNER,
            professional_id,
            professional_confirmed: confirmed,
            kind: NegotiationType::Rental,
            status: NegotiationStatus::Active,
            proposed_price: Some(40.0),
            responded_at: None,
            closed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn checkpoint(kind: CheckpointType, status: CheckpointStatus) -> Checkpoint {
        Checkpoint {
            id: 1,
            negotiation_id: 10,
            kind,
            qr_code: Uuid::new_v4(),
            status,
            generated_by_user_id: RENTER,
            scanned_by_user_id: None,
            scanned_at: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_party_resolution() {
        let n = negotiation(Some(TAILOR), true);
        assert!(Party::resolve(&n, RENTER, None).initiator);
        assert!(Party::resolve(&n, OWNER, None).recipient);
        assert!(Party::resolve(&n, TAILOR_USER, Some(TAILOR)).professional);
        assert!(!Party::resolve(&n, 99, Some(31)).is_party());
        assert!(!Party::resolve(&negotiation(None, false), 99, None).is_party());
    }

    #[test]
    fn test_only_recipient_responds_while_active() {
        let mut n = negotiation(None, false);
        let owner = Party::resolve(&n, OWNER, None);
        let renter = Party::resolve(&n, RENTER, None);

        assert!(ensure_can_respond(&n, owner).is_ok());
        assert_eq!(ensure_can_respond(&n, renter), Err(HandoffError::WrongRole("recipient")));

        n.status = NegotiationStatus::Accepted;
        assert_eq!(ensure_can_respond(&n, owner), Err(HandoffError::NotActive));
    }

    #[test]
    fn test_confirm_professional_rules() {
        let renter = |n: &Negotiation| Party::resolve(n, RENTER, None);

        let n = negotiation(None, false);
        assert_eq!(ensure_can_confirm_professional(&n, renter(&n)), Err(HandoffError::NoProfessional));

        let n = negotiation(Some(TAILOR), true);
        assert_eq!(ensure_can_confirm_professional(&n, renter(&n)), Err(HandoffError::AlreadyConfirmed));

        let n = negotiation(Some(TAILOR), false);
        assert!(ensure_can_confirm_professional(&n, renter(&n)).is_ok());
        let owner = Party::resolve(&n, OWNER, None);
        assert!(ensure_can_confirm_professional(&n, owner).unwrap_err().is_forbidden());
    }

    #[test]
    fn test_generation_sequence_with_professional() {
        let n = negotiation(Some(TAILOR), true);
        let renter = Party::resolve(&n, RENTER, None);
        let tailor = Party::resolve(&n, TAILOR_USER, Some(TAILOR));

        assert!(ensure_can_generate(CheckpointType::DeliveryToProfessional, &n, renter, &[]).is_ok());

        let pending = [checkpoint(CheckpointType::DeliveryToProfessional, CheckpointStatus::Pending)];
        assert_eq!(
            ensure_can_generate(CheckpointType::ReturnFromProfessional, &n, tailor, &pending),
            Err(HandoffError::PrerequisiteNotScanned(CheckpointType::DeliveryToProfessional))
        );

        let delivered = [checkpoint(CheckpointType::DeliveryToProfessional, CheckpointStatus::Scanned)];
        assert!(ensure_can_generate(CheckpointType::ReturnFromProfessional, &n, tailor, &delivered).is_ok());
        assert_eq!(
            ensure_can_generate(CheckpointType::ReturnToOwner, &n, renter, &delivered),
            Err(HandoffError::PrerequisiteNotScanned(CheckpointType::ReturnFromProfessional))
        );
    }

    #[test]
    fn test_delivery_requires_confirmed_professional() {
        let n = negotiation(Some(TAILOR), false);
        let renter = Party::resolve(&n, RENTER, None);
        assert_eq!(
            ensure_can_generate(CheckpointType::DeliveryToProfessional, &n, renter, &[]),
            Err(HandoffError::ProfessionalNotConfirmed)
        );
    }

    #[test]
    fn test_return_to_owner_without_professional() {
        let n = negotiation(None, false);
        let renter = Party::resolve(&n, RENTER, None);
        let owner = Party::resolve(&n, OWNER, None);
        assert!(ensure_can_generate(CheckpointType::ReturnToOwner, &n, renter, &[]).is_ok());
        assert!(ensure_can_generate(CheckpointType::ReturnToOwner, &n, owner, &[]).is_err());
    }

    #[test]
    fn test_scan_permissions() {
        let n = negotiation(Some(TAILOR), true);
        let renter = Party::resolve(&n, RENTER, None);
        let owner = Party::resolve(&n, OWNER, None);
        let tailor = Party::resolve(&n, TAILOR_USER, Some(TAILOR));

        let delivery = checkpoint(CheckpointType::DeliveryToProfessional, CheckpointStatus::Pending);
        assert!(ensure_can_scan(&delivery, tailor, TAILOR_USER).is_ok());
        assert_eq!(ensure_can_scan(&delivery, renter, RENTER), Err(HandoffError::ScanNotPermitted(RENTER)));

        let back = checkpoint(CheckpointType::ReturnFromProfessional, CheckpointStatus::Pending);
        assert!(ensure_can_scan(&back, renter, RENTER).is_ok());

        let home = checkpoint(CheckpointType::ReturnToOwner, CheckpointStatus::Pending);
        assert!(ensure_can_scan(&home, owner, OWNER).is_ok());
        assert!(ensure_can_scan(&home, renter, RENTER).is_err());
    }

    #[test]
    fn test_rescan_rejected() {
        let n = negotiation(None, false);
        let owner = Party::resolve(&n, OWNER, None);
        let scanned = checkpoint(CheckpointType::ReturnToOwner, CheckpointStatus::Scanned);
        let err = ensure_can_scan(&scanned, owner, OWNER).unwrap_err();
        assert_eq!(err, HandoffError::AlreadyScanned);
        assert!(!err.is_forbidden());
    }

    #[test]
    fn test_mark_read_only_touches_received_messages() {
        let message = |id: i64, sender_id: i64, is_read: bool| NegotiationMessage {
            id,
            negotiation_id: 10,
            sender_id,
            message: format!("message {}", id),
            is_read,
            created_at: Utc::now(),
        };

        let mut thread = vec![
            message(1, RENTER, false),
            message(2, OWNER, false),
            message(3, OWNER, true),
            message(4, TAILOR_USER, false),
        ];

        assert_eq!(mark_read(&mut thread, RENTER), vec![2, 4]);
        assert!(!thread[0].is_read);
        assert!(thread.iter().skip(1).all(|m| m.is_read));

        assert!(mark_read(&mut thread, RENTER).is_empty());
    }
}
