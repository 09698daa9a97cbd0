use std::sync::Arc;

use validator::Validate;

use super::{page_offset, Page};
use crate::{
    domain::*,
    error::{AppError, FieldErrors, Result},
    iban::{self, IbanError, IbanVerifier},
    notifications::{status_transition, StatusNotifier},
    repository::RefundRepository,
};

pub const PAGE_SIZE: i64 = 10;

pub struct RefundService {
    repo: Arc<dyn RefundRepository>,
    iban: Arc<IbanVerifier>,
    notifier: Arc<StatusNotifier>,
}

impl RefundService {
    pub fn new(
        repo: Arc<dyn RefundRepository>,
        iban: Arc<IbanVerifier>,
        notifier: Arc<StatusNotifier>,
    ) -> Self {
        Self { repo, iban, notifier }
    }

    /// Staff see everything; everyone else only their own requests.
    pub fn can_access(actor: &User, refund: &RefundRequest) -> bool {
        actor.is_staff || refund.user_id == actor.id
    }

    /// Validates and stores a new request owned by `owner`. The status
    /// always starts as pending and the IBAN must pass validation.
    pub async fn submit(&self, owner: &User, mut input: RefundInput) -> Result<RefundRequest> {
        input.iban = iban::normalize(&input.iban);

        let mut errors = validation_errors(&input);
        let verified = if errors.contains("iban") {
            false
        } else {
            self.verify_iban(&input.iban, &mut errors).await
        };
        errors.into_result()?;

        let refund = self.repo.create(NewRefundRequest {
            user_id: owner.id,
            input,
            iban_verified: verified,
        }).await?;

        tracing::info!("User {} submitted refund #{}", owner.username, refund.id);
        Ok(refund)
    }

    async fn verify_iban(&self, iban: &str, errors: &mut FieldErrors) -> bool {
        match self.iban.is_valid(iban).await {
            Ok(true) => true,
            Ok(false) => {
                errors.add("iban", iban::INVALID_IBAN_MESSAGE);
                false
            }
            Err(IbanError::Missing) => {
                errors.add("iban", "This field is required.");
                false
            }
            Err(IbanError::Format(msg)) => {
                errors.add("iban", msg);
                false
            }
            Err(IbanError::Upstream { .. }) | Err(IbanError::Transport(_)) => {
                errors.add("iban", iban::LOOKUP_FAILED_MESSAGE);
                false
            }
        }
    }

    pub async fn get_for(&self, actor: &User, id: i64) -> Result<RefundRequest> {
        self.repo
            .find_by_id(id)
            .await?
            .filter(|refund| Self::can_access(actor, refund))
            .ok_or_else(|| AppError::NotFound("Refund request not found".to_string()))
    }

    /// The API list: all requests for staff, own requests otherwise.
    pub async fn list_visible(&self, actor: &User, limit: i64, offset: i64) -> Result<(Vec<RefundRequest>, i64)> {
        let owner = if actor.is_staff { None } else { Some(actor.id) };
        let items = self.repo.list(owner, limit, offset).await?;
        let total = self.repo.count(owner).await?;
        Ok((items, total))
    }

    /// The web list: the user's own requests, newest first.
    pub async fn list_own(&self, user: &User, page: i64) -> Result<Page<RefundRequest>> {
        let (page, offset) = page_offset(page, PAGE_SIZE);
        let items = self.repo.list(Some(user.id), PAGE_SIZE, offset).await?;
        let total = self.repo.count(Some(user.id)).await?;
        Ok(Page { items, total, page, per_page: PAGE_SIZE })
    }

    pub async fn search(&self, actor: &User, filter: &RefundFilter, page: i64, per_page: i64) -> Result<Page<RefundWithOwner>> {
        if !actor.is_staff {
            return Err(AppError::Forbidden);
        }
        let per_page = per_page.max(1);
        let (page, offset) = page_offset(page, per_page);
        let items = self.repo.search(filter, per_page, offset).await?;
        let total = self.repo.count_matching(filter).await?;
        Ok(Page { items, total, page, per_page })
    }

    /// Every request matching `filter`, for the admin JSON export.
    pub async fn export(&self, actor: &User, filter: &RefundFilter) -> Result<Vec<RefundWithOwner>> {
        if !actor.is_staff {
            return Err(AppError::Forbidden);
        }
        let total = self.repo.count_matching(filter).await?;
        let items = self.repo.search(filter, total.max(1), 0).await?;
        tracing::info!("User {} exported {} refund requests", actor.username, items.len());
        Ok(items)
    }

    /// Applies `changes` on behalf of `actor`. A status change from a
    /// non-staff actor is dropped, and an IBAN change is re-verified.
    /// When the stored status moves, the owner gets one email after the
    /// write succeeds.
    pub async fn update(&self, actor: &User, id: i64, changes: RefundChanges) -> Result<RefundRequest> {
        let previous = self.get_for(actor, id).await?;

        let status = match changes.status {
            Some(status) if actor.is_staff => status,
            Some(_) => {
                tracing::debug!("Ignoring status change from non-staff user {}", actor.username);
                previous.status
            }
            None => previous.status,
        };

        let mut input = changes.apply_to(previous.to_input());
        input.iban = iban::normalize(&input.iban);

        let mut errors = validation_errors(&input);
        let iban_verified = if input.iban == previous.iban {
            previous.iban_verified
        } else if errors.contains("iban") {
            false
        } else {
            self.verify_iban(&input.iban, &mut errors).await
        };
        errors.into_result()?;

        self.save(&previous, &input, iban_verified, status).await
    }

    async fn save(
        &self,
        previous: &RefundRequest,
        input: &RefundInput,
        iban_verified: bool,
        status: RefundStatus,
    ) -> Result<RefundRequest> {
        let saved = match self.repo
            .update_if_status(previous.id, input, iban_verified, status, previous.status)
            .await?
        {
            Some(saved) => saved,
            None => {
                // Either the row is gone or another writer moved its status.
                return match self.repo.find_by_id(previous.id).await? {
                    None => Err(AppError::NotFound("Refund request not found".to_string())),
                    Some(_) => Err(AppError::Conflict(
                        "The refund request was changed by someone else. Reload and try again.".to_string(),
                    )),
                };
            }
        };

        if let Some(new_status) = status_transition(Some(previous), &saved) {
            tracing::info!(
                "Refund #{} moved from {} to {}",
                saved.id,
                previous.status,
                new_status
            );
            self.notifier.notify_status_change(&saved).await?;
        }

        Ok(saved)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<()> {
        let refund = self.get_for(actor, id).await?;
        if !self.repo.delete(refund.id).await? {
            return Err(AppError::NotFound("Refund request not found".to_string()));
        }
        tracing::info!("User {} deleted refund #{}", actor.username, refund.id);
        Ok(())
    }
}

fn validation_errors(input: &RefundInput) -> FieldErrors {
    match input.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors.into(),
    }
}
