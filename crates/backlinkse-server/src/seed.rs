//! Default datasets for the public content collections and the active
//! site configuration documents, plus the first admin account.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::content::{
    BlogPost, CaseStudy, Content, Faq, GuestPostingPackage, HomepageSection, LinkBuildingPackage,
    PricingPlan, Service, Testimonial,
};
use crate::models::site::{GlobalSettings, LiveChat, Navigation, SiteConfig, Theme};
use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::models::{build, seed, Role, User, Validate};
use crate::store::{new_id, Store};

/// Insert `C`'s defaults if its collection is empty. Returns how many were
/// inserted.
pub fn ensure_content<C: Content>(store: &Store, now: DateTime<Utc>) -> Result<usize> {
    store.ensure_seeded(|| seed::<C>(C::SEED, now).with_context(|| format!("seed {}", C::COLLECTION)))
}

/// The active `S`, inserting the default as active when none is.
pub fn ensure_site<S: SiteConfig>(store: &Store, now: DateTime<Utc>) -> Result<S> {
    store.ensure_active(|| {
        let raw: serde_json::Value =
            serde_json::from_str(S::SEED).with_context(|| format!("parse {} seed", S::COLLECTION))?;
        Ok(build::<S>(raw, now, &[])?)
    })
}

/// Seed every content collection and every singleton. Returns the number of
/// content documents inserted.
pub fn seed_all(store: &Store, now: DateTime<Utc>) -> Result<usize> {
    let inserted: usize = [
        ensure_content::<Faq>(store, now)?,
        ensure_content::<Testimonial>(store, now)?,
        ensure_content::<BlogPost>(store, now)?,
        ensure_content::<CaseStudy>(store, now)?,
        ensure_content::<Service>(store, now)?,
        ensure_content::<HomepageSection>(store, now)?,
        ensure_content::<PricingPlan>(store, now)?,
        ensure_content::<LinkBuildingPackage>(store, now)?,
        ensure_content::<GuestPostingPackage>(store, now)?,
    ]
    .iter()
    .sum();

    ensure_site::<GlobalSettings>(store, now)?;
    ensure_site::<Theme>(store, now)?;
    ensure_site::<Navigation>(store, now)?;
    ensure_site::<LiveChat>(store, now)?;

    info!(inserted, "seeded content and site configuration");
    Ok(inserted)
}

/// Create a verified admin account. Fails if the email is taken.
pub fn create_admin(
    store: &Store,
    name: &str,
    email: &str,
    plain: &str,
    now: DateTime<Utc>,
) -> Result<User> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        anyhow::bail!("password must be at least {MIN_PASSWORD_LEN} characters");
    }
    let mut user = User {
        id: new_id(),
        name: name.trim().to_owned(),
        email: email.to_owned(),
        password_hash: String::new(),
        role: Role::Admin,
        is_verified: true,
        is_suspended: false,
        is_active: true,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };
    user.validate()?;
    user.password_hash = password::hash(plain)?;
    store.create_user(&mut user)?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db::tests::make_store;

    #[test]
    fn seed_all_is_idempotent() {
        let (store, _dir) = make_store();
        let first = seed_all(&store, Utc::now()).unwrap();
        assert_eq!(first, 4 + 3 + 3 + 4 + 5 + 8 + 4 + 4 + 3);
        assert_eq!(seed_all(&store, Utc::now()).unwrap(), 0);
        assert_eq!(store.count::<Theme>().unwrap(), 1);
        assert_eq!(store.count::<Faq>().unwrap(), 4);
    }

    #[test]
    fn ensure_site_returns_the_existing_active_document() {
        let (store, _dir) = make_store();
        let first = ensure_site::<LiveChat>(&store, Utc::now()).unwrap();
        let second = ensure_site::<LiveChat>(&store, Utc::now()).unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_active);
    }

    #[test]
    fn create_admin_is_verified_and_unique() {
        let (store, _dir) = make_store();
        let admin = create_admin(&store, "Site Admin", "Admin@Example.com", "hunter22", Utc::now()).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_verified);
        assert_eq!(admin.email, "admin@example.com");
        assert!(password::verify("hunter22", &admin.password_hash));

        let err = create_admin(&store, "Other", "admin@example.com", "hunter22", Utc::now()).unwrap_err();
        assert!(crate::store::StoreError::is_duplicate(&err));
        assert!(create_admin(&store, "Short", "s@example.com", "abc", Utc::now()).is_err());
    }
}
