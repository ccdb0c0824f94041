use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::json;
use tracing::{debug, info};

use crate::database::entities::{credit_transactions, profiles};
use crate::errors::BillingError;

/// Credits charged for one completed generation.
pub const GENERATION_COST: i64 = 5;

pub const GENERATION_SOURCE: &str = "Image Generation";

pub const DEFAULT_PLAN: &str = "free";

/// Profile balances and the append-only credit ledger.
#[derive(Clone)]
pub struct BillingService {
    db: DatabaseConnection,
}

impl BillingService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Fetch the profile, creating an empty one on first use.
    pub async fn ensure_profile(&self, user_id: &str) -> Result<profiles::Model, BillingError> {
        if let Some(profile) = profiles::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        {
            return Ok(profile);
        }

        let now = Utc::now();
        let profile = profiles::ActiveModel {
            id: Set(user_id.to_string()),
            email: Set(None),
            display_name: Set(None),
            credits: Set(0),
            plan: Set(DEFAULT_PLAN.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        info!("Created profile for {}", user_id);
        Ok(profile)
    }

    pub async fn balance(&self, user_id: &str) -> Result<i64, BillingError> {
        profiles::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
            .map(|profile| profile.credits)
            .ok_or_else(|| BillingError::ProfileNotFound(user_id.to_string()))
    }

    /// Charge one generation for `project_id`.
    ///
    /// There is no minimum balance: the stored balance stops at zero while the
    /// ledger always records the full cost.
    pub async fn debit_generation(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<profiles::Model, BillingError> {
        self.ensure_profile(user_id).await?;

        let txn = self.db.begin().await?;

        // computed in SQL so concurrent debits cannot overwrite each other
        profiles::Entity::update_many()
            .col_expr(
                profiles::Column::Credits,
                Expr::cust(format!("MAX(credits - {}, 0)", GENERATION_COST)),
            )
            .col_expr(profiles::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(profiles::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        credit_transactions::ActiveModel {
            user_id: Set(user_id.to_string()),
            amount: Set(-GENERATION_COST),
            source: Set(GENERATION_SOURCE.to_string()),
            metadata: Set(Some(json!({ "project_id": project_id }).to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let profile = profiles::Entity::find_by_id(user_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| BillingError::ProfileNotFound(user_id.to_string()))?;

        txn.commit().await?;

        debug!(
            "Debited {} credits from {} for project {}, {} left",
            GENERATION_COST, user_id, project_id, profile.credits
        );
        Ok(profile)
    }

    /// Add credits, e.g. after a purchase.
    pub async fn grant_credits(
        &self,
        user_id: &str,
        amount: i64,
        source: &str,
    ) -> Result<profiles::Model, BillingError> {
        if amount <= 0 {
            return Err(BillingError::InvalidAmount(amount));
        }

        self.ensure_profile(user_id).await?;

        let txn = self.db.begin().await?;

        profiles::Entity::update_many()
            .col_expr(
                profiles::Column::Credits,
                Expr::col(profiles::Column::Credits).add(amount),
            )
            .col_expr(profiles::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(profiles::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        credit_transactions::ActiveModel {
            user_id: Set(user_id.to_string()),
            amount: Set(amount),
            source: Set(source.to_string()),
            metadata: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let profile = profiles::Entity::find_by_id(user_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| BillingError::ProfileNotFound(user_id.to_string()))?;

        txn.commit().await?;

        info!("Granted {} credits to {} ({})", amount, user_id, source);
        Ok(profile)
    }

    /// Ledger entries for `user_id`, newest first.
    pub async fn history(
        &self,
        user_id: &str,
    ) -> Result<Vec<credit_transactions::Model>, BillingError> {
        Ok(credit_transactions::Entity::find()
            .filter(credit_transactions::Column::UserId.eq(user_id))
            .order_by_desc(credit_transactions::Column::CreatedAt)
            .order_by_desc(credit_transactions::Column::Id)
            .all(&self.db)
            .await?)
    }
}
