//! Account repository for chart of accounts database operations.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use rust_decimal::Decimal;
use keelbook_core::account::{build_hierarchy, is_valid_code, AccountNode, AccountSummary};
use keelbook_shared::types::AccountId;
use keelbook_shared::AppError;

use crate::cache::{Cache, NoopCache, ACCOUNT_HIERARCHY_KEY};
use crate::entities::{
    accounts, journal_lines,
    sea_orm_active_enums::{AccountNature, AccountType},
};

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Account code already exists.
    #[error("Account code '{0}' already exists")]
    DuplicateCode(String),

    /// Account code is empty, too long, or contains whitespace.
    #[error("Invalid account code '{0}'")]
    InvalidCode(String),

    /// Parent account not found.
    #[error("Parent account not found: {0}")]
    ParentNotFound(AccountId),

    /// An account cannot be its own parent or ancestor.
    #[error("Account '{0}' cannot be its own parent")]
    SelfParent(String),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Cannot delete an account that still has children.
    #[error("Cannot delete account '{code}': it has {children} child accounts")]
    HasChildren {
        /// The account code.
        code: String,
        /// Number of direct children.
        children: u64,
    },

    /// Cannot delete an account with posting history.
    #[error("Cannot delete account '{code}': it has {postings} journal lines")]
    HasPostings {
        /// The account code.
        code: String,
        /// Number of journal lines.
        postings: u64,
    },

    /// Cannot delete an account with a non-zero balance.
    #[error("Cannot delete account '{code}': balance is {balance}")]
    NonZeroBalance {
        /// The account code.
        code: String,
        /// The current balance.
        balance: Decimal,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AccountError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::InvalidCode(_) => "INVALID_ACCOUNT_CODE",
            Self::ParentNotFound(_) => "PARENT_NOT_FOUND",
            Self::SelfParent(_) => "SELF_PARENT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::HasChildren { .. } => "ACCOUNT_HAS_CHILDREN",
            Self::HasPostings { .. } => "ACCOUNT_HAS_POSTINGS",
            Self::NonZeroBalance { .. } => "ACCOUNT_HAS_BALANCE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match &err {
            AccountError::DuplicateCode(_) => Self::Conflict(err.to_string()),
            AccountError::InvalidCode(_) | AccountError::SelfParent(_) => {
                Self::Validation(err.to_string())
            }
            AccountError::ParentNotFound(_) | AccountError::AccountNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            AccountError::HasChildren { .. }
            | AccountError::HasPostings { .. }
            | AccountError::NonZeroBalance { .. } => Self::BusinessRule(err.to_string()),
            AccountError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Account code (globally unique).
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Balance nature; defaults from the type when `None`.
    pub nature: Option<AccountNature>,
    /// Parent account for hierarchy placement.
    pub parent_id: Option<AccountId>,
    /// Whether this is a group (non-postable) node.
    pub is_group: bool,
    /// Balance carried in from a prior system; `None` means zero.
    pub opening_balance: Option<Decimal>,
}

/// Input for updating an account. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccountInput {
    /// New account code.
    pub code: Option<String>,
    /// New account name.
    pub name: Option<String>,
    /// New parent (`Some(None)` moves the account to the root).
    pub parent_id: Option<Option<AccountId>>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
    /// Freeze or unfreeze.
    pub is_frozen: Option<bool>,
}

/// Filter options for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Filter by account type.
    pub account_type: Option<AccountType>,
    /// Filter by active status.
    pub is_active: Option<bool>,
    /// Filter by parent (`Some(None)` = root accounts only).
    pub parent_id: Option<Option<AccountId>>,
}

/// Converts an account row into the flat shape core logic consumes.
#[must_use]
pub fn to_summary(model: &accounts::Model) -> AccountSummary {
    AccountSummary {
        id: AccountId::from_uuid(model.id),
        code: model.code.clone(),
        name: model.name.clone(),
        parent_id: model.parent_id.map(AccountId::from_uuid),
        level: model.level,
        is_group: model.is_group,
        is_active: model.is_active,
        is_frozen: model.is_frozen,
        balance: model.balance,
    }
}

/// Account repository for chart of accounts CRUD.
#[derive(Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
    cache: Arc<dyn Cache>,
}

impl AccountRepository {
    /// Creates a repository without caching.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: Arc::new(NoopCache),
        }
    }

    /// Creates a repository with an explicit cache collaborator.
    #[must_use]
    pub fn with_cache(db: DatabaseConnection, cache: Arc<dyn Cache>) -> Self {
        Self { db, cache }
    }

    /// Creates a new account.
    ///
    /// If a parent is given and that parent is currently a leaf, it is
    /// promoted to a group in the same transaction. Postings already on
    /// the parent are untouched; only new postings are refused.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is invalid or taken, or the parent
    /// does not exist.
    pub async fn create_account(
        &self,
        input: CreateAccountInput,
    ) -> Result<accounts::Model, AccountError> {
        if !is_valid_code(&input.code) {
            return Err(AccountError::InvalidCode(input.code));
        }

        let existing = accounts::Entity::find()
            .filter(accounts::Column::Code.eq(&input.code))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AccountError::DuplicateCode(input.code));
        }

        let parent = match input.parent_id {
            Some(parent_id) => Some(
                accounts::Entity::find_by_id(parent_id.into_inner())
                    .one(&self.db)
                    .await?
                    .ok_or(AccountError::ParentNotFound(parent_id))?,
            ),
            None => None,
        };

        let level = parent.as_ref().map_or(1, |p| p.level + 1);
        let nature = input.nature.unwrap_or_else(|| {
            keelbook_core::account::AccountType::from(input.account_type.clone())
                .default_nature()
                .into()
        });

        let txn = self.db.begin().await?;
        let now = chrono::Utc::now().into();

        // Auto-promote a leaf parent to a group.
        if let Some(parent_model) = parent {
            if !parent_model.is_group {
                let mut active: accounts::ActiveModel = parent_model.into();
                active.is_group = Set(true);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
        }

        let opening = input.opening_balance.unwrap_or(Decimal::ZERO);
        let account = accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            code: Set(input.code),
            name: Set(input.name),
            account_type: Set(input.account_type),
            nature: Set(nature),
            parent_id: Set(input.parent_id.map(AccountId::into_inner)),
            level: Set(level),
            is_group: Set(input.is_group),
            is_active: Set(true),
            is_frozen: Set(false),
            balance: Set(opening),
            opening_balance: Set(opening),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let account = account.insert(&txn).await?;
        txn.commit().await?;

        self.cache.invalidate(ACCOUNT_HIERARCHY_KEY);
        tracing::debug!(code = %account.code, level = account.level, "account created");
        Ok(account)
    }

    /// Updates an account.
    ///
    /// Type and nature are fixed at creation; code, name, parent, and
    /// the active/frozen flags may change. A parent change re-derives
    /// the level of the account and of its whole subtree, and promotes
    /// a leaf parent to a group just like account creation does.
    ///
    /// # Errors
    ///
    /// Returns an error if the account is missing, a new code collides,
    /// or the new parent is missing, the account itself, or one of its
    /// descendants.
    pub async fn update_account(
        &self,
        id: AccountId,
        input: UpdateAccountInput,
    ) -> Result<accounts::Model, AccountError> {
        let account = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(AccountError::AccountNotFound(id))?;

        if let Some(new_code) = &input.code {
            if !is_valid_code(new_code) {
                return Err(AccountError::InvalidCode(new_code.clone()));
            }
            if *new_code != account.code {
                let existing = accounts::Entity::find()
                    .filter(accounts::Column::Code.eq(new_code))
                    .filter(accounts::Column::Id.ne(id.into_inner()))
                    .one(&self.db)
                    .await?;
                if existing.is_some() {
                    return Err(AccountError::DuplicateCode(new_code.clone()));
                }
            }
        }

        let old_level = account.level;
        let mut new_level = None;
        let mut promote_parent = None;
        if let Some(new_parent) = &input.parent_id {
            if let Some(parent_id) = new_parent {
                if *parent_id == id {
                    return Err(AccountError::SelfParent(account.code));
                }
                let parent = accounts::Entity::find_by_id(parent_id.into_inner())
                    .one(&self.db)
                    .await?
                    .ok_or(AccountError::ParentNotFound(*parent_id))?;

                // Walk up from the new parent; finding the account there
                // means the parent sits inside the account's own subtree.
                let mut ancestor = parent.parent_id;
                while let Some(ancestor_id) = ancestor {
                    if ancestor_id == id.into_inner() {
                        return Err(AccountError::SelfParent(account.code));
                    }
                    ancestor = accounts::Entity::find_by_id(ancestor_id)
                        .one(&self.db)
                        .await?
                        .and_then(|m| m.parent_id);
                }

                new_level = Some(parent.level + 1);
                if !parent.is_group {
                    promote_parent = Some(parent);
                }
            } else {
                new_level = Some(1);
            }
        }

        let txn = self.db.begin().await?;
        let now = chrono::Utc::now().into();

        // Auto-promote a leaf parent to a group, as account creation does.
        if let Some(parent_model) = promote_parent {
            let mut active: accounts::ActiveModel = parent_model.into();
            active.is_group = Set(true);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        let mut active: accounts::ActiveModel = account.into();
        if let Some(code) = input.code {
            active.code = Set(code);
        }
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(parent_id) = input.parent_id {
            active.parent_id = Set(parent_id.map(AccountId::into_inner));
        }
        if let Some(level) = new_level {
            active.level = Set(level);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_frozen) = input.is_frozen {
            active.is_frozen = Set(is_frozen);
        }
        active.updated_at = Set(now);

        let updated = active.update(&txn).await?;

        // A moved subtree keeps its internal shape, so every descendant
        // shifts by the same level delta.
        let delta = updated.level - old_level;
        if delta != 0 {
            let mut frontier = vec![updated.id];
            while !frontier.is_empty() {
                let children = accounts::Entity::find()
                    .filter(accounts::Column::ParentId.is_in(frontier.clone()))
                    .all(&txn)
                    .await?;
                frontier = children.iter().map(|c| c.id).collect();
                for child in children {
                    let level = child.level + delta;
                    let mut active: accounts::ActiveModel = child.into();
                    active.level = Set(level);
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                }
            }
        }

        txn.commit().await?;
        self.cache.invalidate(ACCOUNT_HIERARCHY_KEY);
        Ok(updated)
    }

    /// Deletes an account.
    ///
    /// Refused while the account has children, posting history, or a
    /// non-zero balance. Once all three guards pass, the row is removed
    /// for real; there is nothing to audit on a never-posted account.
    ///
    /// # Errors
    ///
    /// Returns the first violated guard, naming the account code.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), AccountError> {
        let account = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(AccountError::AccountNotFound(id))?;

        let children = accounts::Entity::find()
            .filter(accounts::Column::ParentId.eq(id.into_inner()))
            .count(&self.db)
            .await?;
        if children > 0 {
            return Err(AccountError::HasChildren {
                code: account.code,
                children,
            });
        }

        let postings = journal_lines::Entity::find()
            .filter(journal_lines::Column::AccountId.eq(id.into_inner()))
            .count(&self.db)
            .await?;
        if postings > 0 {
            return Err(AccountError::HasPostings {
                code: account.code,
                postings,
            });
        }

        if account.balance != Decimal::ZERO {
            return Err(AccountError::NonZeroBalance {
                code: account.code,
                balance: account.balance,
            });
        }

        account.delete(&self.db).await?;
        self.cache.invalidate(ACCOUNT_HIERARCHY_KEY);
        Ok(())
    }

    /// Returns the full chart of accounts as a forest, cached.
    ///
    /// The cached value is a serialized forest; a hit skips the database
    /// entirely. Every account write invalidates the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_hierarchy(&self) -> Result<Vec<AccountNode>, AccountError> {
        if let Some(cached) = self.cache.get(ACCOUNT_HIERARCHY_KEY) {
            if let Ok(nodes) = serde_json::from_value::<Vec<AccountNode>>(cached) {
                return Ok(nodes);
            }
        }

        let rows = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await?;

        let summaries: Vec<AccountSummary> = rows.iter().map(to_summary).collect();
        let forest = build_hierarchy(summaries);

        if let Ok(value) = serde_json::to_value(&forest) {
            self.cache.set(ACCOUNT_HIERARCHY_KEY, value);
        }
        Ok(forest)
    }

    /// Lists accounts with optional filters, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_accounts(
        &self,
        filter: AccountFilter,
    ) -> Result<Vec<accounts::Model>, AccountError> {
        let mut query = accounts::Entity::find().order_by_asc(accounts::Column::Code);

        if let Some(account_type) = filter.account_type {
            query = query.filter(accounts::Column::AccountType.eq(account_type));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(accounts::Column::IsActive.eq(is_active));
        }
        if let Some(parent_id) = filter.parent_id {
            query = match parent_id {
                Some(pid) => query.filter(accounts::Column::ParentId.eq(pid.into_inner())),
                None => query.filter(accounts::Column::ParentId.is_null()),
            };
        }

        Ok(query.all(&self.db).await?)
    }

    /// Finds an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_account_by_id(
        &self,
        id: AccountId,
    ) -> Result<Option<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?)
    }

    /// Finds an account by its unique code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_account_by_code(
        &self,
        code: &str,
    ) -> Result<Option<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code))
            .one(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_boundary_mapping_per_variant() {
        let conflict: AppError = AccountError::DuplicateCode("1000".to_string()).into();
        assert_eq!(conflict.status_code(), 409);
        assert_eq!(conflict.error_code(), "CONFLICT");

        let missing: AppError = AccountError::AccountNotFound(AccountId::new()).into();
        assert_eq!(missing.status_code(), 404);

        let invalid: AppError = AccountError::InvalidCode(String::new()).into();
        assert_eq!(invalid.status_code(), 400);

        let guard: AppError = AccountError::NonZeroBalance {
            code: "1000".to_string(),
            balance: dec!(12.50),
        }
        .into();
        assert_eq!(guard.status_code(), 422);
        assert!(!guard.is_retryable());
    }
}
