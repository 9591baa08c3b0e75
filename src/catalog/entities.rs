//! The CMS model declarations: one `EntityDef` per admin screen.

use crate::catalog::types::*;
use crate::catalog::FieldKind::*;

const MIB: u64 = 1024 * 1024;

/// Campaign target type -> entity segment.
pub const CAMPAIGN_TARGETS: &[(&str, &str)] = &[
    ("post", "posts"),
    ("episode", "episodes"),
    ("seminar", "seminars"),
    ("conference", "conferences"),
];

fn status_sets() -> Vec<StatusSet> {
    vec![
        StatusSet::new("publish_status", &["published", "draft", "deleted"], "draft"),
        StatusSet::new("event_status", &["live", "schedule", "archive"], "schedule"),
        StatusSet::new("account_status", &["active", "inactive", "banned"], "active"),
        StatusSet::new("campaign_status", &["draft", "active", "paused", "ended"], "draft"),
        StatusSet::new("moderation_status", &["pending", "approved", "spam"], "pending"),
        StatusSet::new("subscription_status", &["active", "cancelled", "expired"], "active"),
        StatusSet::new("record_status", &["active", "inactive"], "active"),
    ]
}

fn seo_fields(e: EntityDef) -> EntityDef {
    e.field(FieldDef::text("meta_title", 70))
        .field(FieldDef::text("meta_description", 160))
}

fn specialties() -> EntityDef {
    EntityDef::new("specialties", "specialties", "name")
        .status("record_status")
        .field(FieldDef::text("name", 120).required().unique().searchable())
        .field(FieldDef::text("slug", 140).slug_from("name"))
        .field(FieldDef::new("description", LongText))
        .field(
            FieldDef::text("icon", 255)
                .image(ImageRule::photo(MIB).square(64))
                .not_exported(),
        )
}

fn tags() -> EntityDef {
    EntityDef::new("tags", "tags", "name")
        .status("record_status")
        .field(FieldDef::text("name", 80).required().min_length(2).unique().searchable())
        .field(FieldDef::text("slug", 100).slug_from("name"))
}

fn users() -> EntityDef {
    EntityDef::new("users", "users", "name")
        .status("account_status")
        .field(FieldDef::text("name", 120).required().searchable())
        .field(FieldDef::text("email", 190).required().format("email").unique().searchable())
        .field(FieldDef::text("phone", 20).format("phone"))
        .field(FieldDef::text("role", 20).not_null().allowed(&["admin", "editor", "member"]).default_sql("'member'").sortable())
        .field(FieldDef::new("specialty_id", BigInt).belongs_to("specialties", "specialty", OnDelete::SetNull))
        .field(
            FieldDef::text("avatar", 255)
                .image(ImageRule::photo(MIB).square(100))
                .not_exported(),
        )
        .field(FieldDef::text("password_hash", 255).sensitive().guarded())
        .field(FieldDef::new("last_login_at", Timestamp).guarded().sortable())
}

fn posts() -> EntityDef {
    let e = EntityDef::new("posts", "posts", "title")
        .status("publish_status")
        .field(FieldDef::text("title", 200).required().searchable())
        .field(FieldDef::text("custom_url", 220).slug_from("title"))
        .field(FieldDef::text("excerpt", 500).searchable())
        .field(FieldDef::new("content", LongText).required().not_exported())
        .field(
            FieldDef::text("thumbnail", 255)
                .image(ImageRule::photo(2 * MIB).at_least(800, 450))
                .not_exported(),
        )
        .field(FieldDef::new("specialty_id", BigInt).belongs_to("specialties", "specialty", OnDelete::SetNull))
        .field(FieldDef::new("author_id", BigInt).belongs_to("users", "author", OnDelete::SetNull))
        .field(FieldDef::new("tags", Json).default_sql("'[]'::jsonb"))
        .field(FieldDef::new("published_at", Timestamp).format("datetime").sortable())
        .field(FieldDef::new("views", Integer).not_null().default_sql("0").guarded().sortable());
    seo_fields(e)
}

fn episodes() -> EntityDef {
    let e = EntityDef::new("episodes", "episodes", "title")
        .status("publish_status")
        .field(FieldDef::text("title", 200).required().searchable())
        .field(FieldDef::text("custom_url", 220).slug_from("title"))
        .field(FieldDef::new("description", LongText).not_exported())
        .field(FieldDef::text("video_url", 500).format("url"))
        .field(FieldDef::text("audio_url", 500).format("url"))
        .field(
            FieldDef::text("thumbnail", 255)
                .image(ImageRule::photo(2 * MIB).exact(1280, 720))
                .not_exported(),
        )
        .field(FieldDef::new("duration_seconds", Integer).range(0.0, 86_400.0).sortable())
        .field(FieldDef::new("season", Integer).range(1.0, 999.0).sortable())
        .field(FieldDef::new("episode_number", Integer).range(1.0, 9999.0).sortable())
        .field(FieldDef::new("specialty_id", BigInt).belongs_to("specialties", "specialty", OnDelete::SetNull))
        .field(FieldDef::new("tags", Json).default_sql("'[]'::jsonb"))
        .field(FieldDef::new("published_at", Timestamp).format("datetime").sortable())
        .field(FieldDef::new("views", Integer).not_null().default_sql("0").guarded().sortable());
    seo_fields(e)
}

fn seminars() -> EntityDef {
    EntityDef::new("seminars", "seminars", "title")
        .status("event_status")
        .field(FieldDef::text("title", 200).required().searchable())
        .field(FieldDef::text("custom_url", 220).slug_from("title"))
        .field(FieldDef::new("description", LongText).not_exported())
        .field(FieldDef::text("speaker_name", 120).searchable())
        .field(FieldDef::new("speaker_bio", LongText).not_exported())
        .field(
            FieldDef::text("banner", 255)
                .image(ImageRule::photo(3 * MIB).at_least(1200, 400))
                .not_exported(),
        )
        .field(FieldDef::new("starts_at", Timestamp).required().format("datetime").sortable())
        .field(FieldDef::new("ends_at", Timestamp).format("datetime").sortable())
        .field(FieldDef::text("timezone", 64).default_sql("'UTC'"))
        .field(FieldDef::text("registration_url", 500).format("url"))
        .field(FieldDef::new("price", Decimal).range(0.0, 100_000.0).sortable())
        .field(FieldDef::new("specialty_id", BigInt).belongs_to("specialties", "specialty", OnDelete::SetNull))
}

fn conferences() -> EntityDef {
    EntityDef::new("conferences", "conferences", "title")
        .status("event_status")
        .field(FieldDef::text("title", 200).required().searchable())
        .field(FieldDef::text("custom_url", 220).slug_from("title"))
        .field(FieldDef::new("description", LongText).not_exported())
        .field(FieldDef::text("venue", 200).searchable())
        .field(FieldDef::text("city", 100).searchable())
        .field(FieldDef::text("country", 100).sortable())
        .field(
            FieldDef::text("banner", 255)
                .image(ImageRule::photo(3 * MIB).at_least(1200, 400))
                .not_exported(),
        )
        .field(FieldDef::new("start_date", Date).required().format("date").sortable())
        .field(FieldDef::new("end_date", Date).format("date").sortable())
        .field(FieldDef::text("organizer", 200))
        .field(FieldDef::text("website", 500).format("url"))
        .field(FieldDef::text("contact_phone", 20).format("phone"))
        .field(FieldDef::text("contact_email", 190).format("email"))
        .field(FieldDef::new("specialty_id", BigInt).belongs_to("specialties", "specialty", OnDelete::SetNull))
}

fn business_pages() -> EntityDef {
    EntityDef::new("business-pages", "business_pages", "name")
        .status("publish_status")
        .field(FieldDef::text("name", 160).required().searchable())
        .field(FieldDef::text("custom_url", 180).slug_from("name"))
        .field(FieldDef::new("description", LongText).not_exported())
        .field(
            FieldDef::text("logo", 255)
                .image(ImageRule::photo(MIB).square(200))
                .not_exported(),
        )
        .field(
            FieldDef::text("cover_image", 255)
                .image(ImageRule::photo(3 * MIB).at_least(1200, 400))
                .not_exported(),
        )
        .field(FieldDef::text("phone", 20).format("phone"))
        .field(FieldDef::text("email", 190).format("email").searchable())
        .field(FieldDef::text("website", 500).format("url"))
        .field(FieldDef::text("address", 500))
}

fn campaigns() -> EntityDef {
    let target_types: Vec<&str> = CAMPAIGN_TARGETS.iter().map(|(t, _)| *t).collect();
    EntityDef::new("campaigns", "campaigns", "title")
        .status("campaign_status")
        .field(
            FieldDef::new("business_page_id", BigInt)
                .required()
                .belongs_to("business-pages", "business_page", OnDelete::Cascade),
        )
        .field(FieldDef::text("title", 200).required().searchable())
        .field(FieldDef::text("target_type", 20).required().allowed(&target_types).sortable())
        .field(FieldDef::new("target_id", BigInt).required().indexed())
        .field(
            FieldDef::text("banner", 255)
                .image(ImageRule::photo(2 * MIB).exact(1200, 628))
                .not_exported(),
        )
        .field(FieldDef::new("starts_on", Date).required().format("date").sortable())
        .field(FieldDef::new("ends_on", Date).format("date").sortable())
        .field(FieldDef::new("budget", Decimal).range(0.0, 10_000_000.0).sortable())
        .field(FieldDef::new("clicks", Integer).not_null().default_sql("0").guarded().sortable())
        .field(FieldDef::new("impressions", Integer).not_null().default_sql("0").guarded().sortable())
        .morph("target", "target_type", "target_id", CAMPAIGN_TARGETS)
}

fn comments() -> EntityDef {
    EntityDef::new("comments", "comments", "id")
        .status("moderation_status")
        .field(FieldDef::new("post_id", BigInt).required().belongs_to("posts", "post", OnDelete::Cascade))
        .field(FieldDef::new("user_id", BigInt).belongs_to("users", "user", OnDelete::SetNull))
        .field(FieldDef::new("body", LongText).required().max_length(5000).searchable())
}

fn subscriptions() -> EntityDef {
    EntityDef::new("subscriptions", "subscriptions", "plan")
        .status("subscription_status")
        .field(FieldDef::new("user_id", BigInt).required().belongs_to("users", "user", OnDelete::Cascade))
        .field(FieldDef::text("plan", 20).required().allowed(&["monthly", "yearly", "lifetime"]).sortable())
        .field(FieldDef::new("amount", Decimal).required().range(0.0, 100_000.0).sortable())
        .field(FieldDef::text("currency", 3).not_null().pattern("^[A-Z]{3}$").default_sql("'USD'"))
        .field(FieldDef::new("starts_at", Timestamp).required().format("datetime").sortable())
        .field(FieldDef::new("ends_at", Timestamp).format("datetime").sortable())
}

fn login_histories() -> EntityDef {
    EntityDef::new("login-histories", "login_histories", "id")
        .read_only()
        .field(FieldDef::new("user_id", BigInt).required().belongs_to("users", "user", OnDelete::Cascade))
        .field(FieldDef::text("ip_address", 45).searchable())
        .field(FieldDef::text("user_agent", 500))
        .field(FieldDef::new("logged_in_at", Timestamp).not_null().default_sql("NOW()").sortable())
}

fn page_views() -> EntityDef {
    let viewable: &[(&str, &str)] = &[
        ("post", "posts"),
        ("episode", "episodes"),
        ("seminar", "seminars"),
        ("conference", "conferences"),
        ("business_page", "business-pages"),
    ];
    EntityDef::new("page-views", "page_views", "id")
        .read_only()
        .field(FieldDef::text("viewable_type", 30).required().sortable())
        .field(FieldDef::new("viewable_id", BigInt).required().indexed())
        .field(FieldDef::new("user_id", BigInt).belongs_to("users", "user", OnDelete::SetNull))
        .field(FieldDef::text("ip_address", 45).searchable())
        .field(FieldDef::text("referrer", 500))
        .field(FieldDef::new("viewed_at", Timestamp).not_null().default_sql("NOW()").sortable())
        .morph("viewable", "viewable_type", "viewable_id", viewable)
}

/// Full CMS catalog, parents declared before children.
pub fn cms_catalog() -> CatalogDef {
    CatalogDef {
        status_sets: status_sets(),
        entities: vec![
            specialties(),
            tags(),
            users(),
            posts(),
            episodes(),
            seminars(),
            conferences(),
            business_pages(),
            campaigns(),
            comments(),
            subscriptions(),
            login_histories(),
            page_views(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::validate;

    #[test]
    fn cms_catalog_is_valid() {
        validate(&cms_catalog()).expect("valid catalog");
    }

    #[test]
    fn campaign_targets_are_declared_entities() {
        let def = cms_catalog();
        for (_, segment) in CAMPAIGN_TARGETS {
            assert!(def.entities.iter().any(|e| e.segment == *segment), "{}", segment);
        }
    }
}
