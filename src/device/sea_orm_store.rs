//! SeaORM-backed device storage.
//!
//! Every query joins the owning user with `find_also_related`, so a list page
//! is a single `SELECT`.
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id BIGINT PRIMARY KEY,
//!     username VARCHAR(150) NOT NULL,
//!     email VARCHAR(254) NOT NULL
//! );
//!
//! CREATE TABLE otp_totp_totpdevice (
//!     id BIGINT PRIMARY KEY,
//!     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     name VARCHAR(64) NOT NULL,
//!     created_at TIMESTAMPTZ NULL,
//!     last_used_at TIMESTAMPTZ NULL,
//!     confirmed BOOLEAN NOT NULL,
//!     key VARCHAR(80) NOT NULL,
//!     step INTEGER NOT NULL,
//!     t0 BIGINT NOT NULL,
//!     digits INTEGER NOT NULL,
//!     tolerance INTEGER NOT NULL,
//!     drift INTEGER NOT NULL,
//!     throttling_failure_timestamp TIMESTAMPTZ NULL,
//!     throttling_failure_count INTEGER NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, NotSet, PaginatorTrait, QueryFilter, QueryOrder, Schema, Set, Unchanged,
    sea_query::{Expr, Func, LikeExpr},
};

use super::query::{DateFilter, DeviceQuery, PaginatedResult};
use super::storage::DeviceStore;
use super::types::{DeviceUser, NewDevice, TotpDevice};
use crate::error::{AdminError, Result};

mod entity {
    pub mod totp_device {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "otp_totp_totpdevice")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i64,
            pub user_id: i64,
            pub name: String,
            pub created_at: Option<DateTimeUtc>,
            pub last_used_at: Option<DateTimeUtc>,
            pub confirmed: bool,
            pub key: String,
            pub step: i32,
            pub t0: i64,
            pub digits: i32,
            pub tolerance: i32,
            pub drift: i32,
            pub throttling_failure_timestamp: Option<DateTimeUtc>,
            pub throttling_failure_count: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {
            #[sea_orm(
                belongs_to = "super::user::Entity",
                from = "Column::UserId",
                to = "super::user::Column::Id",
                on_delete = "Cascade"
            )]
            User,
        }

        impl Related<super::user::Entity> for Entity {
            fn to() -> RelationDef {
                Relation::User.def()
            }
        }

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod user {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "users")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: i64,
            pub username: String,
            pub email: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::{totp_device, user};

#[inline]
fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[inline]
fn to_u8(value: i32) -> u8 {
    u8::try_from(value).unwrap_or(0)
}

#[inline]
fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn model_to_device(model: totp_device::Model, owner: Option<user::Model>) -> Result<TotpDevice> {
    let owner = owner.ok_or_else(|| {
        AdminError::storage(format!(
            "TOTP device {} references missing user {}",
            model.id, model.user_id
        ))
    })?;

    Ok(TotpDevice {
        id: model.id,
        user: DeviceUser {
            id: owner.id,
            username: owner.username,
            email: owner.email,
        },
        name: model.name,
        created_at: model.created_at,
        last_used_at: model.last_used_at,
        confirmed: model.confirmed,
        key: model.key,
        step: to_u32(model.step),
        t0: model.t0,
        digits: to_u8(model.digits),
        tolerance: to_u8(model.tolerance),
        drift: model.drift,
        throttling_failure_timestamp: model.throttling_failure_timestamp,
        throttling_failure_count: to_u32(model.throttling_failure_count),
    })
}

fn date_condition(column: totp_device::Column, filter: DateFilter) -> Option<Condition> {
    let now = Utc::now();
    match filter {
        DateFilter::Any => None,
        DateFilter::HasDate => Some(Condition::all().add(column.is_not_null())),
        DateFilter::NoDate => Some(Condition::all().add(column.is_null())),
        _ => filter.bounds(now).map(|(start, end)| {
            Condition::all()
                .add(column.gte(start))
                .add(column.lt(end))
        }),
    }
}

fn search_condition(query: &DeviceQuery) -> Option<Condition> {
    let term = query.search_term()?;
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));

    let mut condition = Condition::any();
    for field in &query.search_fields {
        let column = match field.as_str() {
            "username" => user::Column::Username,
            "email" => user::Column::Email,
            _ => continue,
        };
        condition = condition.add(
            Expr::expr(Func::lower(Expr::col((user::Entity, column))))
                .like(LikeExpr::new(pattern.clone()).escape('\\')),
        );
    }

    // A search with no usable fields matches nothing.
    if condition.is_empty() {
        return Some(Condition::all().add(Expr::value(false)));
    }
    Some(condition)
}

/// Escape `LIKE` wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// SeaORM-backed device store.
#[derive(Clone, Debug)]
pub struct SeaOrmDeviceStore {
    db: DatabaseConnection,
}

impl SeaOrmDeviceStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create the `users` and `otp_totp_totpdevice` tables from the entities.
    ///
    /// Intended for tests and local development; production schemas belong
    /// in migrations.
    pub async fn create_tables(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let users = schema
            .create_table_from_entity(user::Entity)
            .if_not_exists()
            .to_owned();
        self.db.execute(backend.build(&users)).await?;

        let devices = schema
            .create_table_from_entity(totp_device::Entity)
            .if_not_exists()
            .to_owned();
        self.db.execute(backend.build(&devices)).await?;

        Ok(())
    }

    /// Insert a user row. The users table normally belongs to the host
    /// application; this exists for seeding.
    pub async fn insert_user(&self, owner: &DeviceUser) -> Result<()> {
        user::ActiveModel {
            id: Set(owner.id),
            username: Set(owner.username.clone()),
            email: Set(owner.email.clone()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for SeaOrmDeviceStore {
    async fn get(&self, pk: i64) -> Result<Option<TotpDevice>> {
        tracing::debug!(device_id = pk, "finding TOTP device by id");

        let row = totp_device::Entity::find_by_id(pk)
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;

        row.map(|(device, owner)| model_to_device(device, owner))
            .transpose()
    }

    async fn list(&self, query: &DeviceQuery) -> Result<PaginatedResult<TotpDevice>> {
        let mut condition = Condition::all();
        if let Some(confirmed) = query.confirmed {
            condition = condition.add(totp_device::Column::Confirmed.eq(confirmed));
        }
        if let Some(c) = date_condition(totp_device::Column::CreatedAt, query.created_at) {
            condition = condition.add(c);
        }
        if let Some(c) = date_condition(totp_device::Column::LastUsedAt, query.last_used_at) {
            condition = condition.add(c);
        }
        if let Some(c) = search_condition(query) {
            condition = condition.add(c);
        }

        let per_page = query.per_page.max(1);
        let paginator = totp_device::Entity::find()
            .find_also_related(user::Entity)
            .filter(condition)
            .order_by_desc(totp_device::Column::CreatedAt)
            .order_by_desc(totp_device::Column::Id)
            .paginate(&self.db, u64::from(per_page));

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(u64::from(query.page.max(1) - 1)).await?;

        let items = rows
            .into_iter()
            .map(|(device, owner)| model_to_device(device, owner))
            .collect::<Result<Vec<_>>>()?;

        Ok(PaginatedResult::new(items, total, query.page, per_page))
    }

    async fn create(&self, device: NewDevice) -> Result<TotpDevice> {
        let owner = user::Entity::find_by_id(device.user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AdminError::field("user", "Select a valid user"))?;

        let model = totp_device::ActiveModel {
            id: NotSet,
            user_id: Set(device.user_id),
            name: Set(device.name),
            created_at: Set(Some(Utc::now())),
            last_used_at: Set(None),
            confirmed: Set(device.confirmed),
            key: Set(device.key),
            step: Set(to_i32(device.step)),
            t0: Set(device.t0),
            digits: Set(i32::from(device.digits)),
            tolerance: Set(i32::from(device.tolerance)),
            drift: Set(device.drift),
            throttling_failure_timestamp: Set(device.throttling_failure_timestamp),
            throttling_failure_count: Set(to_i32(device.throttling_failure_count)),
        }
        .insert(&self.db)
        .await?;

        tracing::debug!(device_id = model.id, user_id = owner.id, "created TOTP device");
        model_to_device(model, Some(owner))
    }

    async fn update(&self, device: &TotpDevice) -> Result<()> {
        let model = totp_device::ActiveModel {
            id: Unchanged(device.id),
            user_id: NotSet,
            name: Set(device.name.clone()),
            created_at: NotSet,
            last_used_at: NotSet,
            confirmed: Set(device.confirmed),
            key: Set(device.key.clone()),
            step: Set(to_i32(device.step)),
            t0: Set(device.t0),
            digits: Set(i32::from(device.digits)),
            tolerance: Set(i32::from(device.tolerance)),
            drift: Set(device.drift),
            throttling_failure_timestamp: Set(device.throttling_failure_timestamp),
            throttling_failure_count: Set(to_i32(device.throttling_failure_count)),
        };

        match model.update(&self.db).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => {
                Err(AdminError::not_found(format!("TOTP device {}", device.id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    async fn store() -> SeaOrmDeviceStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let store = SeaOrmDeviceStore::new(db);
        store.create_tables().await.unwrap();
        store
            .insert_user(&DeviceUser {
                id: 1,
                username: "alice".into(),
                email: "alice@example.com".into(),
            })
            .await
            .unwrap();
        store
            .insert_user(&DeviceUser {
                id: 2,
                username: "bob".into(),
                email: "bob@corp.test".into(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_and_get_joined() {
        let store = store().await;
        let created = store.create(NewDevice::new(1, "phone")).await.unwrap();

        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.user.username, "alice");
        assert_eq!(fetched.key, created.key);
        assert_eq!(fetched.digits, 6);
        assert!(store.get(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_search_and_filter() {
        let store = store().await;
        store.create(NewDevice::new(1, "phone")).await.unwrap();
        store
            .create(NewDevice::new(2, "laptop").confirmed(false))
            .await
            .unwrap();

        let query = DeviceQuery {
            search: Some("CORP".into()),
            search_fields: vec!["username".into(), "email".into()],
            ..Default::default()
        };
        let page = store.list(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user.username, "bob");

        let query = DeviceQuery {
            confirmed: Some(true),
            created_at: DateFilter::Today,
            ..Default::default()
        };
        let page = store.list(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "phone");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_ice"), "a\\_ice");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("alice"), "alice");
    }

    #[tokio::test]
    async fn test_search_wildcards_match_literally() {
        let store = store().await;
        store.create(NewDevice::new(1, "phone")).await.unwrap();
        store.create(NewDevice::new(2, "laptop")).await.unwrap();

        for term in ["_", "%", "a_ice"] {
            let query = DeviceQuery {
                search: Some(term.into()),
                search_fields: vec!["username".into(), "email".into()],
                ..Default::default()
            };
            let page = store.list(&query).await.unwrap();
            assert_eq!(page.total, 0, "term {:?} matched", term);
        }

        let query = DeviceQuery {
            search: Some("@corp.".into()),
            search_fields: vec!["email".into()],
            ..Default::default()
        };
        assert_eq!(store.list(&query).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_update_missing_device() {
        let store = store().await;
        let mut device = store.create(NewDevice::new(1, "phone")).await.unwrap();
        device.id = 999;
        let result = store.update(&device).await;
        assert!(matches!(result, Err(AdminError::NotFound(_))));
    }
}
