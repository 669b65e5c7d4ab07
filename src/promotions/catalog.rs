// Promotion Catalog
//
// Loads the active promotion definitions (with tiers, benefits, and JSONB
// restriction sets fully expanded) and the static valuation reference tables
// from PostgreSQL. Implements a time-based cache with 60-second TTL to
// balance performance and freshness.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::promotions::{
    error::{PromoResult, PromotionError},
    restrictions::Restriction,
    types::{PromotionType, RewardType, ValueType},
};

/// Time-to-live for the cached catalog (60 seconds)
const CACHE_TTL: Duration = Duration::from_secs(60);

/// One promotion definition with its benefits or tiers expanded
///
/// Invariant: exactly one of `benefits` / `tiers` is non-empty. Violations
/// are caught by `validate` and the promotion is refused, not guessed at.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub promotion_type: PromotionType,
    /// The chain, card, or portal this promotion is linked to, selected by
    /// `promotion_type`
    pub link_id: i32,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_single_use: bool,
    pub restrictions: Option<Restriction>,
    pub benefits: Vec<Benefit>,
    pub tiers: Vec<Tier>,
}

impl Promotion {
    /// Structural validation before matching
    pub fn validate(&self) -> PromoResult<()> {
        if !self.benefits.is_empty() && !self.tiers.is_empty() {
            return Err(PromotionError::InvalidConfiguration(format!(
                "promotion {} has both flat benefits and tiers",
                self.id
            )));
        }
        if self.benefits.is_empty() && self.tiers.is_empty() {
            return Err(PromotionError::InvalidConfiguration(format!(
                "promotion {} has neither benefits nor tiers",
                self.id
            )));
        }
        for tier in &self.tiers {
            if let Some(max_stays) = tier.max_stays {
                if tier.min_stays > max_stays {
                    return Err(PromotionError::InvalidConfiguration(format!(
                        "tier {} has inverted stay range", tier.id
                    )));
                }
            }
            if let (Some(min), Some(max)) = (tier.min_nights, tier.max_nights) {
                if min > max {
                    return Err(PromotionError::InvalidConfiguration(format!(
                        "tier {} has inverted night range", tier.id
                    )));
                }
            }
        }
        if let Some(ref restriction) = self.restrictions {
            restriction.validate()?;
        }
        for benefit in self.benefits.iter().chain(self.tiers.iter().flat_map(|t| &t.benefits)) {
            if let Some(ref restriction) = benefit.restrictions {
                restriction.validate()?;
            }
        }
        Ok(())
    }
}

/// One reward tier within a tiered promotion
///
/// Ranges are measured in cumulative qualifying stays (and optionally
/// cumulative nights) for the owning promotion, in chronological order.
#[derive(Debug, Clone)]
pub struct Tier {
    pub id: Uuid,
    pub min_stays: u32,
    pub max_stays: Option<u32>,
    pub min_nights: Option<i32>,
    pub max_nights: Option<i32>,
    pub sort_order: i32,
    pub benefits: Vec<Benefit>,
}

impl Tier {
    /// Whether this tier's ranges contain the given stay ordinal and
    /// cumulative night count
    pub fn contains(&self, stay_ordinal: u32, cumulative_nights: i32) -> bool {
        if stay_ordinal < self.min_stays {
            return false;
        }
        if let Some(max_stays) = self.max_stays {
            if stay_ordinal > max_stays {
                return false;
            }
        }
        if let Some(min_nights) = self.min_nights {
            if cumulative_nights < min_nights {
                return false;
            }
        }
        if let Some(max_nights) = self.max_nights {
            if cumulative_nights > max_nights {
                return false;
            }
        }
        true
    }
}

/// One benefit, owned by a promotion (flat) or by a tier
#[derive(Debug, Clone)]
pub struct Benefit {
    pub id: Uuid,
    pub reward_type: RewardType,
    pub value_type: ValueType,
    pub value: Decimal,
    pub cert_type: Option<String>,
    pub is_tie_in: bool,
    pub sort_order: i32,
    pub restrictions: Option<Restriction>,
}

/// Static valuation reference data: per-chain point values and per-type
/// certificate values
#[derive(Debug, Clone, Default)]
pub struct ValuationTable {
    pub point_values: HashMap<i32, Decimal>,
    pub cert_values: HashMap<String, Decimal>,
}

impl ValuationTable {
    /// Cash value of one point for a chain; zero when the chain is unknown
    pub fn point_value(&self, hotel_chain_id: Option<i32>) -> Decimal {
        hotel_chain_id
            .and_then(|id| self.point_values.get(&id).copied())
            .unwrap_or(Decimal::ZERO)
    }

    /// Cash value of one certificate of the given type; zero when unlisted
    pub fn cert_value(&self, cert_type: &str) -> Decimal {
        self.cert_values.get(cert_type).copied().unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    name: String,
    promotion_type: PromotionType,
    link_id: i32,
    is_active: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    is_single_use: bool,
    restrictions: Option<serde_json::Value>,
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    id: Uuid,
    promotion_id: Uuid,
    min_stays: i32,
    max_stays: Option<i32>,
    min_nights: Option<i32>,
    max_nights: Option<i32>,
    sort_order: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct BenefitRow {
    id: Uuid,
    promotion_id: Option<Uuid>,
    tier_id: Option<Uuid>,
    reward_type: RewardType,
    value_type: ValueType,
    value: Decimal,
    cert_type: Option<String>,
    is_tie_in: bool,
    sort_order: i32,
    restrictions: Option<serde_json::Value>,
}

fn parse_restrictions(raw: Option<serde_json::Value>) -> PromoResult<Option<Restriction>> {
    match raw {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Cached snapshot of the catalog
#[derive(Debug, Clone)]
struct CatalogCache {
    promotions: Vec<Promotion>,
    valuation: ValuationTable,
    last_updated: Option<Instant>,
}

impl CatalogCache {
    fn new() -> Self {
        Self {
            promotions: Vec::new(),
            valuation: ValuationTable::default(),
            last_updated: None,
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        match self.last_updated {
            Some(at) => at.elapsed() > ttl,
            None => true,
        }
    }
}

/// Promotion Catalog store
///
/// Loads and caches active promotions and valuation reference data.
pub struct PromotionCatalog {
    pool: PgPool,
    cache: Arc<RwLock<CatalogCache>>,
    cache_ttl: Duration,
}

impl PromotionCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Arc::new(RwLock::new(CatalogCache::new())),
            cache_ttl: CACHE_TTL,
        }
    }

    /// Get all active promotions with benefits, tiers, and restrictions
    /// expanded, refreshing the cache when stale
    pub async fn active_promotions(&self) -> PromoResult<Vec<Promotion>> {
        self.refresh_if_stale().await?;
        Ok(self.cache.read().await.promotions.clone())
    }

    /// Get the valuation reference tables, refreshing the cache when stale
    pub async fn valuation(&self) -> PromoResult<ValuationTable> {
        self.refresh_if_stale().await?;
        Ok(self.cache.read().await.valuation.clone())
    }

    /// Force a reload on the next read
    pub async fn invalidate(&self) {
        self.cache.write().await.last_updated = None;
    }

    async fn refresh_if_stale(&self) -> PromoResult<()> {
        if !self.cache.read().await.is_stale(self.cache_ttl) {
            return Ok(());
        }

        let promotions = self.load_promotions().await?;
        let valuation = self.load_valuation().await?;

        let mut cache = self.cache.write().await;
        cache.promotions = promotions;
        cache.valuation = valuation;
        cache.last_updated = Some(Instant::now());
        tracing::debug!("Promotion catalog cache refreshed ({} promotions)", cache.promotions.len());
        Ok(())
    }

    async fn load_promotions(&self) -> PromoResult<Vec<Promotion>> {
        let promotion_rows = sqlx::query_as::<_, PromotionRow>(
            r#"
            SELECT id, name, promotion_type, link_id, is_active,
                   start_date, end_date, is_single_use, restrictions
            FROM promotions
            WHERE is_active = TRUE
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tier_rows = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, promotion_id, min_stays, max_stays, min_nights, max_nights, sort_order
            FROM promotion_tiers
            ORDER BY sort_order, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let benefit_rows = sqlx::query_as::<_, BenefitRow>(
            r#"
            SELECT id, promotion_id, tier_id, reward_type, value_type, value,
                   cert_type, is_tie_in, sort_order, restrictions
            FROM benefits
            ORDER BY sort_order, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        // Group benefits under their flat promotion or their tier.
        let mut flat_benefits: HashMap<Uuid, Vec<Benefit>> = HashMap::new();
        let mut tier_benefits: HashMap<Uuid, Vec<Benefit>> = HashMap::new();
        for row in benefit_rows {
            let benefit = Benefit {
                id: row.id,
                reward_type: row.reward_type,
                value_type: row.value_type,
                value: row.value,
                cert_type: row.cert_type,
                is_tie_in: row.is_tie_in,
                sort_order: row.sort_order,
                restrictions: parse_restrictions(row.restrictions)?,
            };
            if let Some(tier_id) = row.tier_id {
                tier_benefits.entry(tier_id).or_default().push(benefit);
            } else if let Some(promotion_id) = row.promotion_id {
                flat_benefits.entry(promotion_id).or_default().push(benefit);
            }
        }

        let mut tiers: HashMap<Uuid, Vec<Tier>> = HashMap::new();
        for row in tier_rows {
            tiers.entry(row.promotion_id).or_default().push(Tier {
                id: row.id,
                min_stays: row.min_stays.max(0) as u32,
                max_stays: row.max_stays.map(|v| v.max(0) as u32),
                min_nights: row.min_nights,
                max_nights: row.max_nights,
                sort_order: row.sort_order,
                benefits: tier_benefits.remove(&row.id).unwrap_or_default(),
            });
        }

        let mut promotions = Vec::with_capacity(promotion_rows.len());
        for row in promotion_rows {
            promotions.push(Promotion {
                id: row.id,
                name: row.name,
                promotion_type: row.promotion_type,
                link_id: row.link_id,
                is_active: row.is_active,
                start_date: row.start_date,
                end_date: row.end_date,
                is_single_use: row.is_single_use,
                restrictions: parse_restrictions(row.restrictions)?,
                benefits: flat_benefits.remove(&row.id).unwrap_or_default(),
                tiers: tiers.remove(&row.id).unwrap_or_default(),
            });
        }

        Ok(promotions)
    }

    async fn load_valuation(&self) -> PromoResult<ValuationTable> {
        let chains: Vec<(i32, Decimal)> =
            sqlx::query_as("SELECT id, point_value FROM hotel_chains")
                .fetch_all(&self.pool)
                .await?;

        let certs: Vec<(String, Decimal)> =
            sqlx::query_as("SELECT cert_type, cash_value FROM certificate_values")
                .fetch_all(&self.pool)
                .await?;

        Ok(ValuationTable {
            point_values: chains.into_iter().collect(),
            cert_values: certs.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn benefit() -> Benefit {
        Benefit {
            id: Uuid::new_v4(),
            reward_type: RewardType::Cashback,
            value_type: ValueType::Fixed,
            value: dec!(50),
            cert_type: None,
            is_tie_in: false,
            sort_order: 0,
            restrictions: None,
        }
    }

    fn tier(min_stays: u32, max_stays: Option<u32>) -> Tier {
        Tier {
            id: Uuid::new_v4(),
            min_stays,
            max_stays,
            min_nights: None,
            max_nights: None,
            sort_order: 0,
            benefits: vec![benefit()],
        }
    }

    fn promotion() -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            promotion_type: PromotionType::Loyalty,
            link_id: 1,
            is_active: true,
            start_date: None,
            end_date: None,
            is_single_use: false,
            restrictions: None,
            benefits: vec![benefit()],
            tiers: Vec::new(),
        }
    }

    #[test]
    fn test_validate_accepts_flat_promotion() {
        assert!(promotion().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_both_benefits_and_tiers() {
        let mut p = promotion();
        p.tiers = vec![tier(1, None)];
        assert!(matches!(
            p.validate(),
            Err(PromotionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_promotion() {
        let mut p = promotion();
        p.benefits.clear();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_tier_range() {
        let mut p = promotion();
        p.benefits.clear();
        p.tiers = vec![tier(3, Some(1))];
        assert!(matches!(
            p.validate(),
            Err(PromotionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_tier_contains_stay_ordinal() {
        let t = tier(1, Some(1));
        assert!(t.contains(1, 5));
        assert!(!t.contains(2, 5));

        let open_ended = tier(2, None);
        assert!(!open_ended.contains(1, 5));
        assert!(open_ended.contains(2, 5));
        assert!(open_ended.contains(10, 50));
    }

    #[test]
    fn test_tier_night_range() {
        let mut t = tier(1, None);
        t.min_nights = Some(5);
        t.max_nights = Some(10);
        assert!(!t.contains(1, 4));
        assert!(t.contains(1, 5));
        assert!(t.contains(1, 10));
        assert!(!t.contains(1, 11));
    }

    #[test]
    fn test_valuation_table_defaults_to_zero() {
        let rates = ValuationTable::default();
        assert_eq!(rates.point_value(Some(1)), dec!(0));
        assert_eq!(rates.point_value(None), dec!(0));
        assert_eq!(rates.cert_value("anything"), dec!(0));
    }
}
