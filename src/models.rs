//! Blog-domain entities and their table declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::orm::{Entity, Field, TableDecl};

/// Time-ordered unique id: a zero-padded millisecond timestamp followed by a
/// random suffix. Fifty characters, sorts by creation time.
pub fn next_id() -> String {
    format!(
        "{:015}{}000",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Seconds since the epoch, fractional.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn generated_id() -> Value {
    Value::String(next_id())
}

fn now_value() -> Value {
    serde_json::json!(now_secs())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub passwd: String,
    pub admin: bool,
    pub name: String,
    pub image: String,
    pub created_at: Option<f64>,
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn declaration() -> TableDecl {
        TableDecl::new("users")
            .field(
                "id",
                Field::string("varchar(50)")
                    .primary_key()
                    .not_null()
                    .default_fn(generated_id),
            )
            .field("email", Field::string("varchar(50)").not_null())
            .field("passwd", Field::string("varchar(50)").not_null())
            .field("admin", Field::boolean())
            .field("name", Field::string("varchar(50)").not_null())
            .field("image", Field::string("varchar(500)").not_null())
            .field("created_at", Field::float().not_null().default_fn(now_value))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blog {
    pub id: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub user_image: String,
    pub name: String,
    pub summary: String,
    pub content: String,
    pub created_at: Option<f64>,
}

impl Entity for Blog {
    const NAME: &'static str = "Blog";

    fn declaration() -> TableDecl {
        TableDecl::new("blogs")
            .field(
                "id",
                Field::string("varchar(50)")
                    .primary_key()
                    .not_null()
                    .default_fn(generated_id),
            )
            .field("user_id", Field::string("varchar(50)").not_null())
            .field("user_name", Field::string("varchar(50)").not_null())
            .field("user_image", Field::string("varchar(500)").not_null())
            .field("name", Field::string("varchar(50)").not_null())
            .field("summary", Field::string("varchar(200)").not_null())
            .field("content", Field::text().not_null())
            .field("created_at", Field::float().not_null().default_fn(now_value))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub id: Option<String>,
    pub blog_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_image: String,
    pub content: String,
    pub created_at: Option<f64>,
}

impl Entity for Comment {
    const NAME: &'static str = "Comment";

    fn declaration() -> TableDecl {
        TableDecl::new("comments")
            .field(
                "id",
                Field::string("varchar(50)")
                    .primary_key()
                    .not_null()
                    .default_fn(generated_id),
            )
            .field("blog_id", Field::string("varchar(50)").not_null())
            .field("user_id", Field::string("varchar(50)").not_null())
            .field("user_name", Field::string("varchar(50)").not_null())
            .field("user_image", Field::string("varchar(500)").not_null())
            .field("content", Field::text().not_null())
            .field("created_at", Field::float().not_null().default_fn(now_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::Catalog;
    use pretty_assertions::assert_eq;

    #[test]
    fn generated_ids_are_fifty_chars_and_time_ordered() {
        let a = next_id();
        let b = next_id();
        assert_eq!(a.len(), 50);
        assert_eq!(b.len(), 50);
        assert!(a[..15].parse::<u64>().is_ok());
        assert!(a[..15] <= b[..15]);
        assert!(a.ends_with("000"));
        assert_ne!(a, b);
    }

    #[test]
    fn all_entities_register_in_one_catalog() {
        let catalog = Catalog::builder()
            .entity::<User>()
            .unwrap()
            .entity::<Blog>()
            .unwrap()
            .entity::<Comment>()
            .unwrap()
            .finish();

        let users = catalog.get("User").unwrap();
        assert_eq!(users.table, "users");
        assert_eq!(users.pk, "id");
        assert!(users.create.contains("`admin` boolean not null"));

        let blogs = catalog.get("Blog").unwrap();
        assert_eq!(
            blogs.select,
            "select `id`, `user_id`, `user_name`, `user_image`, `name`, `summary`, \
             `content`, `created_at` from `blogs`"
        );
        assert!(catalog.get("Comment").is_some());
    }
}
