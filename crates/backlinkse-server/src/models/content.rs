//! Public marketing content. Every collection here is seeded with a default
//! dataset the first time it is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{default_true, Validate};
use crate::error::{ApiError, ApiResult};
use crate::store::Document;

/// How a collection is ordered when listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// `sortOrder` ascending, ties broken by `createdAt` ascending.
    Curated,
    /// `createdAt` descending.
    NewestFirst,
    /// `sortOrder` ascending only.
    SortOrderOnly,
}

pub trait Content: Document + Validate + Clone {
    /// Noun used in response messages, e.g. "Blog post".
    const SINGULAR: &'static str;
    const PLURAL: &'static str;
    /// JSON keys wrapping one record and a list in `data`.
    const KEY: &'static str;
    const KEYS: &'static str;
    /// Default dataset as a JSON array.
    const SEED: &'static str;
    const ORDER: ListOrder = ListOrder::Curated;

    /// Whether anonymous visitors may see this record.
    fn is_public(&self) -> bool;
    fn sort_order(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;

    /// Whether records carry a handle, which mounts the public lookup route.
    const HAS_HANDLE: bool = false;

    /// Human-readable lookup key (slug, serviceId, sectionId) if the
    /// collection has one.
    fn handle(&self) -> Option<&str> {
        None
    }
}

pub fn sort<C: Content>(items: &mut [C]) {
    items.sort_by(|a, b| match C::ORDER {
        ListOrder::Curated => a
            .sort_order()
            .cmp(&b.sort_order())
            .then_with(|| a.created_at().cmp(&b.created_at())),
        ListOrder::NewestFirst => b
            .created_at()
            .cmp(&a.created_at())
            .then_with(|| a.sort_order().cmp(&b.sort_order())),
        ListOrder::SortOrderOnly => a.sort_order().cmp(&b.sort_order()),
    });
}

/// "All blog posts" but "All FAQs": only lowercase the first letter when the
/// word is not an acronym.
pub fn lower_noun(noun: &str) -> String {
    let mut chars = noun.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if !second.is_uppercase() => {
            first.to_lowercase().chain(noun.chars().skip(1)).collect()
        }
        _ => noun.to_owned(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Published,
    Draft,
}

fn draft() -> PublishStatus {
    PublishStatus::Draft
}

fn require(value: &str, message: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(ApiError::validation(message))
    } else {
        Ok(())
    }
}

fn non_negative(price: f64) -> ApiResult<()> {
    if !price.is_finite() || price < 0.0 {
        Err(ApiError::validation("Price cannot be negative"))
    } else {
        Ok(())
    }
}

macro_rules! curated {
    () => {
        fn sort_order(&self) -> i64 {
            self.sort_order
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    };
}

// ── FAQs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    #[serde(rename = "_id")]
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Faq {
    const COLLECTION: &'static str = "faqs";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for Faq {
    fn validate(&self) -> ApiResult<()> {
        require(&self.question, "Question is required")?;
        require(&self.answer, "Answer is required")
    }
}

impl Content for Faq {
    const SINGULAR: &'static str = "FAQ";
    const PLURAL: &'static str = "FAQs";
    const KEY: &'static str = "faq";
    const KEYS: &'static str = "faqs";
    const SEED: &'static str = include_str!("../../seed/faqs.json");

    fn is_public(&self) -> bool {
        self.visible && self.status == PublishStatus::Published
    }
    curated!();
}

// ── Testimonials ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub role: String,
    pub company: String,
    pub quote: String,
    #[serde(default = "five_stars")]
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn five_stars() -> u8 {
    5
}

impl Document for Testimonial {
    const COLLECTION: &'static str = "testimonials";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for Testimonial {
    fn validate(&self) -> ApiResult<()> {
        require(&self.name, "Name is required")?;
        require(&self.quote, "Quote is required")?;
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::validation("Rating must be between 1 and 5"));
        }
        Ok(())
    }
}

impl Content for Testimonial {
    const SINGULAR: &'static str = "Testimonial";
    const PLURAL: &'static str = "Testimonials";
    const KEY: &'static str = "testimonial";
    const KEYS: &'static str = "testimonials";
    const SEED: &'static str = include_str!("../../seed/testimonials.json");

    fn is_public(&self) -> bool {
        self.visible && self.status == PublishStatus::Published
    }
    curated!();
}

// ── Blog ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogAuthor {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(rename = "_id")]
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<BlogAuthor>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "draft")]
    pub status: PublishStatus,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for BlogPost {
    const COLLECTION: &'static str = "blog_posts";
    fn id(&self) -> &str {
        &self.id
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("slug", self.slug.clone()))
    }
}

impl Validate for BlogPost {
    fn validate(&self) -> ApiResult<()> {
        require(&self.slug, "Slug is required")?;
        require(&self.title, "Title is required")?;
        require(&self.category, "Category is required")
    }
}

impl Content for BlogPost {
    const SINGULAR: &'static str = "Blog post";
    const PLURAL: &'static str = "Blog posts";
    const KEY: &'static str = "post";
    const KEYS: &'static str = "posts";
    const SEED: &'static str = include_str!("../../seed/blog_posts.json");
    const ORDER: ListOrder = ListOrder::NewestFirst;

    fn is_public(&self) -> bool {
        self.status == PublishStatus::Published
    }
    const HAS_HANDLE: bool = true;
    fn handle(&self) -> Option<&str> {
        Some(&self.slug)
    }
    curated!();
}

// ── Case studies ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStudyResult {
    pub label: String,
    pub before: String,
    pub after: String,
    pub change: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStudyTestimonial {
    pub quote: String,
    pub author: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudy {
    #[serde(rename = "_id")]
    pub id: String,
    pub slug: String,
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub industry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_increase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_growth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_after: Option<String>,
    pub links_built: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr_before: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr_after: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords_top10: Option<u32>,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
    #[serde(default)]
    pub strategy: Vec<String>,
    #[serde(default)]
    pub execution: Vec<String>,
    #[serde(default)]
    pub results: Vec<CaseStudyResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testimonial: Option<CaseStudyTestimonial>,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for CaseStudy {
    const COLLECTION: &'static str = "case_studies";
    fn id(&self) -> &str {
        &self.id
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("slug", self.slug.clone()))
    }
}

impl Validate for CaseStudy {
    fn validate(&self) -> ApiResult<()> {
        require(&self.slug, "Slug is required")?;
        require(&self.client, "Client is required")?;
        require(&self.industry, "Industry is required")?;
        require(&self.duration, "Duration is required")
    }
}

impl Content for CaseStudy {
    const SINGULAR: &'static str = "Case study";
    const PLURAL: &'static str = "Case studies";
    const KEY: &'static str = "caseStudy";
    const KEYS: &'static str = "caseStudies";
    const SEED: &'static str = include_str!("../../seed/case_studies.json");

    fn is_public(&self) -> bool {
        self.status == PublishStatus::Published
    }
    const HAS_HANDLE: bool = true;
    fn handle(&self) -> Option<&str> {
        Some(&self.slug)
    }
    curated!();
}

// ── Services ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePackage {
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: String,
    pub service_id: String,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_service_icon")]
    pub icon: String,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub packages: Vec<ServicePackage>,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_service_icon() -> String {
    "Package".into()
}

impl Document for Service {
    const COLLECTION: &'static str = "services";
    fn id(&self) -> &str {
        &self.id
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("serviceId", self.service_id.clone()))
    }
}

impl Validate for Service {
    fn validate(&self) -> ApiResult<()> {
        require(&self.service_id, "Service ID is required")?;
        require(&self.name, "Name is required")?;
        for package in &self.packages {
            non_negative(package.price)?;
        }
        Ok(())
    }
}

impl Content for Service {
    const SINGULAR: &'static str = "Service";
    const PLURAL: &'static str = "Services";
    const KEY: &'static str = "service";
    const KEYS: &'static str = "services";
    const SEED: &'static str = include_str!("../../seed/services.json");

    fn is_public(&self) -> bool {
        self.status == PublishStatus::Published
    }
    const HAS_HANDLE: bool = true;
    fn handle(&self) -> Option<&str> {
        Some(&self.service_id)
    }
    curated!();
}

// ── Homepage sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomepageSection {
    #[serde(rename = "_id")]
    pub id: String,
    pub section_id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub sort_order: i64,
    /// Section-specific layout payload; shape varies per section.
    #[serde(default = "empty_object")]
    pub content: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Document for HomepageSection {
    const COLLECTION: &'static str = "homepage_sections";
    fn id(&self) -> &str {
        &self.id
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("sectionId", self.section_id.clone()))
    }
}

impl Validate for HomepageSection {
    fn validate(&self) -> ApiResult<()> {
        require(&self.section_id, "Section ID is required")?;
        require(&self.name, "Name is required")
    }
}

impl Content for HomepageSection {
    const SINGULAR: &'static str = "Homepage section";
    const PLURAL: &'static str = "Homepage sections";
    const KEY: &'static str = "section";
    const KEYS: &'static str = "sections";
    const SEED: &'static str = include_str!("../../seed/homepage_sections.json");
    const ORDER: ListOrder = ListOrder::SortOrderOnly;

    fn is_public(&self) -> bool {
        self.enabled
    }
    const HAS_HANDLE: bool = true;
    fn handle(&self) -> Option<&str> {
        Some(&self.section_id)
    }
    curated!();
}

// ── Pricing and packages ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlan {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub links_per_month: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub popular: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_button_text")]
    pub button_text: String,
    #[serde(default = "default_button_link")]
    pub button_link: String,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_button_text() -> String {
    "Get Started".into()
}

fn default_button_link() -> String {
    "/contact".into()
}

impl Document for PricingPlan {
    const COLLECTION: &'static str = "pricing_plans";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for PricingPlan {
    fn validate(&self) -> ApiResult<()> {
        require(&self.name, "Name is required")?;
        non_negative(self.price)
    }
}

impl Content for PricingPlan {
    const SINGULAR: &'static str = "Pricing plan";
    const PLURAL: &'static str = "Pricing plans";
    const KEY: &'static str = "plan";
    const KEYS: &'static str = "plans";
    const SEED: &'static str = include_str!("../../seed/pricing_plans.json");

    fn is_public(&self) -> bool {
        self.enabled
    }
    curated!();
}

/// A `null` price renders as "Custom".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBuildingPackage {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub links_per_month: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub popular: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for LinkBuildingPackage {
    const COLLECTION: &'static str = "link_building_packages";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for LinkBuildingPackage {
    fn validate(&self) -> ApiResult<()> {
        require(&self.name, "Name is required")?;
        require(&self.links_per_month, "Links per month is required")?;
        self.price.map_or(Ok(()), non_negative)
    }
}

impl Content for LinkBuildingPackage {
    const SINGULAR: &'static str = "Link building package";
    const PLURAL: &'static str = "Link building packages";
    const KEY: &'static str = "package";
    const KEYS: &'static str = "packages";
    const SEED: &'static str = include_str!("../../seed/link_building_packages.json");

    fn is_public(&self) -> bool {
        self.enabled
    }
    curated!();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestPostingPackage {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_guest_post_icon")]
    pub icon: String,
    #[serde(default)]
    pub popular: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_guest_post_icon() -> String {
    "FileText".into()
}

impl Document for GuestPostingPackage {
    const COLLECTION: &'static str = "guest_posting_packages";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for GuestPostingPackage {
    fn validate(&self) -> ApiResult<()> {
        require(&self.name, "Name is required")?;
        require(&self.description, "Description is required")?;
        self.price.map_or(Ok(()), non_negative)
    }
}

impl Content for GuestPostingPackage {
    const SINGULAR: &'static str = "Guest posting package";
    const PLURAL: &'static str = "Guest posting packages";
    const KEY: &'static str = "package";
    const KEYS: &'static str = "packages";
    const SEED: &'static str = include_str!("../../seed/guest_posting_packages.json");

    fn is_public(&self) -> bool {
        self.enabled
    }
    curated!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seed;

    fn seeds<C: Content>() -> Vec<C> {
        seed::<C>(C::SEED, Utc::now()).unwrap()
    }

    #[test]
    fn every_seed_dataset_decodes_and_validates() {
        assert_eq!(seeds::<Faq>().len(), 4);
        assert_eq!(seeds::<Testimonial>().len(), 3);
        assert_eq!(seeds::<BlogPost>().len(), 3);
        assert_eq!(seeds::<CaseStudy>().len(), 4);
        assert_eq!(seeds::<Service>().len(), 5);
        assert_eq!(seeds::<HomepageSection>().len(), 8);
        assert_eq!(seeds::<PricingPlan>().len(), 4);
        assert_eq!(seeds::<LinkBuildingPackage>().len(), 4);
        assert_eq!(seeds::<GuestPostingPackage>().len(), 3);
    }

    #[test]
    fn seeded_drafts_are_hidden() {
        let posts = seeds::<BlogPost>();
        assert_eq!(posts.iter().filter(|p| p.is_public()).count(), 2);
        let studies = seeds::<CaseStudy>();
        assert_eq!(studies.iter().filter(|s| s.is_public()).count(), 3);
    }

    #[test]
    fn curated_order_uses_sort_order_then_age() {
        let mut faqs = seeds::<Faq>();
        faqs.reverse();
        sort(&mut faqs);
        let orders: Vec<i64> = faqs.iter().map(|f| f.sort_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
    }

    #[test]
    fn lower_noun_keeps_acronyms() {
        assert_eq!(lower_noun("FAQs"), "FAQs");
        assert_eq!(lower_noun("Blog posts"), "blog posts");
    }
}
