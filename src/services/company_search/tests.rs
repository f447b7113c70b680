use super::*;
use crate::db::repositories::SqlxCompanyRepository;
use crate::db::{create_test_pool, migrations};
use crate::models::fixtures::company_data;
use crate::models::{BusinessHours, Company, CompanyData};
use crate::services::clock::FixedClock;
use crate::services::geo_query::{offset_north, GeoCandidate};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

/// Monday 2024-01-01 10:00 UTC
fn monday_ten() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

fn center() -> Coordinates {
    Coordinates::new(-46.63, -23.55)
}

struct Fixture {
    repo: Arc<dyn CompanyRepository>,
    service: CompanySearchService,
    next: usize,
}

impl Fixture {
    async fn new() -> Self {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCompanyRepository::boxed(pool);
        let service = CompanySearchService::new(
            repo.clone(),
            Arc::new(FixedClock::new(monday_ten())),
            BusinessHoursEvaluator::utc(),
        );
        Self {
            repo,
            service,
            next: 0,
        }
    }

    async fn add(&mut self, data: CompanyData) -> i64 {
        self.next += 1;
        let company = self
            .repo
            .create(&Company::new(
                format!("company{}@example.com", self.next),
                "hash".to_string(),
            ))
            .await
            .unwrap();
        self.repo.save_profile(company.id, &data).await.unwrap();
        company.id
    }

    async fn add_at(&mut self, name: &str, meters_north: f64) -> i64 {
        let coords = offset_north(center(), meters_north);
        self.add(company_data(name, coords.longitude, coords.latitude))
            .await
    }
}

fn input(radius: f64, page: u32, sort_by: SortKey, sort_order: SortOrder) -> FindCompaniesInput {
    FindCompaniesInput {
        around_coords: center(),
        radius_in_meters: radius,
        page,
        sort_by,
        sort_order,
        must_be_open: false,
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Query parsing
// ============================================================================

#[test]
fn test_parse_full_query() {
    let parsed = FindCompaniesInput::from_query_pairs(&pairs(&[
        ("aroundCoords", "[-46.63,-23.55]"),
        ("radiusInMeters", "500"),
        ("page", "2"),
        ("sortBy", "name"),
        ("sortOrder", "desc"),
        ("mustBeOpen", "true"),
    ]))
    .unwrap();

    assert_eq!(parsed.around_coords, Coordinates::new(-46.63, -23.55));
    assert_eq!(parsed.radius_in_meters, 500.0);
    assert_eq!(parsed.page, 2);
    assert_eq!(parsed.sort_by, SortKey::Name);
    assert_eq!(parsed.sort_order, SortOrder::Desc);
    assert!(parsed.must_be_open);
}

#[test]
fn test_parse_coordinate_forms() {
    let base = [
        ("radiusInMeters", "1"),
        ("page", "1"),
        ("sortBy", "distance"),
        ("sortOrder", "asc"),
    ];

    let mut plain = pairs(&base);
    plain.push(("aroundCoords".into(), "10.5, 20.25".into()));
    let parsed = FindCompaniesInput::from_query_pairs(&plain).unwrap();
    assert_eq!(parsed.around_coords, Coordinates::new(10.5, 20.25));
    assert!(!parsed.must_be_open);

    let mut repeated = pairs(&base);
    repeated.push(("aroundCoords".into(), "10.5".into()));
    repeated.push(("aroundCoords".into(), "20.25".into()));
    let parsed = FindCompaniesInput::from_query_pairs(&repeated).unwrap();
    assert_eq!(parsed.around_coords, Coordinates::new(10.5, 20.25));

    let mut bad = pairs(&base);
    bad.push(("aroundCoords".into(), "[1,2,3]".into()));
    let err = FindCompaniesInput::from_query_pairs(&bad).unwrap_err();
    assert_eq!(err.path, "aroundCoords");
}

#[test]
fn test_parse_reports_field_paths() {
    let full = [
        ("aroundCoords", "1,2"),
        ("radiusInMeters", "100"),
        ("page", "1"),
        ("sortBy", "distance"),
        ("sortOrder", "asc"),
    ];

    for missing in ["aroundCoords", "radiusInMeters", "page", "sortBy", "sortOrder"] {
        let subset: Vec<_> = full.iter().copied().filter(|(k, _)| *k != missing).collect();
        let err = FindCompaniesInput::from_query_pairs(&pairs(&subset)).unwrap_err();
        assert_eq!(err.path, missing);
    }

    let mut bad_page = pairs(&full);
    bad_page[2].1 = "-1".into();
    assert_eq!(
        FindCompaniesInput::from_query_pairs(&bad_page).unwrap_err().path,
        "page"
    );

    let mut bad_sort = pairs(&full);
    bad_sort[3].1 = "rating".into();
    assert_eq!(
        FindCompaniesInput::from_query_pairs(&bad_sort).unwrap_err().path,
        "sortBy"
    );

    let mut bad_flag = pairs(&full);
    bad_flag.push(("mustBeOpen".into(), "maybe".into()));
    assert_eq!(
        FindCompaniesInput::from_query_pairs(&bad_flag).unwrap_err().path,
        "mustBeOpen"
    );
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_radius_keeps_only_companies_inside() {
    let mut fx = Fixture::new().await;
    fx.add_at("Hundred", 100.0).await;
    fx.add_at("FourHundred", 400.0).await;
    fx.add_at("SixHundred", 600.0).await;

    let result = fx
        .service
        .find_companies(input(500.0, 1, SortKey::Distance, SortOrder::Asc))
        .await
        .unwrap();

    assert_eq!(result.count, 2);
    let names: Vec<_> = result.companies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Hundred", "FourHundred"]);
    assert!(result.companies[0].distance < result.companies[1].distance);
}

#[tokio::test]
async fn test_must_be_open_filters_before_count() {
    let mut fx = Fixture::new().await;
    let closed = vec![BusinessHours::closed(); 7];
    let mut open_monday = closed.clone();
    open_monday[0] = BusinessHours::new(540, 1020);

    for i in 0..5 {
        let coords = offset_north(center(), 50.0 * (i + 1) as f64);
        let mut data = company_data(&format!("C{}", i), coords.longitude, coords.latitude);
        data.business_hours = if i < 2 {
            open_monday.clone()
        } else {
            closed.clone()
        };
        fx.add(data).await;
    }

    let mut query = input(1_000.0, 1, SortKey::Name, SortOrder::Asc);
    query.must_be_open = true;
    let result = fx.service.find_companies(query).await.unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(result.companies.len(), 2);
    assert!(result.companies.iter().all(|c| c.is_open_now));

    query.must_be_open = false;
    let all = fx.service.find_companies(query).await.unwrap();
    assert_eq!(all.count, 5);
    assert_eq!(all.companies.iter().filter(|c| c.is_open_now).count(), 2);
}

#[tokio::test]
async fn test_count_invariant_across_pages_and_past_end() {
    let mut fx = Fixture::new().await;
    for i in 0..30 {
        fx.add_at(&format!("Company {:02}", i), 10.0 * (i + 1) as f64)
            .await;
    }

    let p1 = fx
        .service
        .find_companies(input(10_000.0, 1, SortKey::Name, SortOrder::Asc))
        .await
        .unwrap();
    let p2 = fx
        .service
        .find_companies(input(10_000.0, 2, SortKey::Name, SortOrder::Asc))
        .await
        .unwrap();
    let p9 = fx
        .service
        .find_companies(input(10_000.0, 9, SortKey::Name, SortOrder::Asc))
        .await
        .unwrap();

    assert_eq!((p1.count, p2.count, p9.count), (30, 30, 30));
    assert_eq!(p1.companies.len(), 25);
    assert_eq!(p2.companies.len(), 5);
    assert!(p9.companies.is_empty());
    assert_eq!(p1.companies[0].name, "Company 00");
    assert_eq!(p2.companies[0].name, "Company 25");
}

#[tokio::test]
async fn test_identical_searches_are_idempotent() {
    let mut fx = Fixture::new().await;
    for i in 0..6 {
        fx.add_at("Same Name", 20.0 * (i + 1) as f64).await;
    }

    let query = input(1_000.0, 1, SortKey::Name, SortOrder::Desc);
    let first = fx.service.find_companies(query).await.unwrap();
    let second = fx.service.find_companies(query).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_radius_monotonicity() {
    let mut fx = Fixture::new().await;
    for meters in [50.0, 150.0, 450.0, 900.0, 2_000.0] {
        fx.add_at(&format!("At {}", meters), meters).await;
    }

    let mut previous: Vec<String> = Vec::new();
    for radius in [100.0, 500.0, 1_000.0, 5_000.0] {
        let result = fx
            .service
            .find_companies(input(radius, 1, SortKey::Distance, SortOrder::Asc))
            .await
            .unwrap();
        let names: Vec<String> = result.companies.iter().map(|c| c.name.clone()).collect();
        assert!(previous.iter().all(|n| names.contains(n)));
        previous = names;
    }
    assert_eq!(previous.len(), 5);
}

#[tokio::test]
async fn test_companies_without_profile_are_hidden() {
    let fx = Fixture::new().await;
    fx.repo
        .create(&Company::new("bare@example.com".into(), "hash".into()))
        .await
        .unwrap();

    let result = fx
        .service
        .find_companies(input(1e7, 1, SortKey::Distance, SortOrder::Asc))
        .await
        .unwrap();
    assert_eq!(result.count, 0);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_storage() {
    let fx = Fixture::new().await;

    let err = fx
        .service
        .find_companies(input(0.0, 1, SortKey::Distance, SortOrder::Asc))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Validation(ref e) if e.path == "radiusInMeters"));

    let err = fx
        .service
        .find_companies(input(100.0, 0, SortKey::Distance, SortOrder::Asc))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Validation(ref e) if e.path == "page"));

    let mut query = input(100.0, 1, SortKey::Distance, SortOrder::Asc);
    query.around_coords = Coordinates::new(0.0, 95.0);
    let err = fx.service.find_companies(query).await.unwrap_err();
    assert!(matches!(err, SearchError::Validation(ref e) if e.path == "aroundCoords"));
}

// ============================================================================
// Failure modes
// ============================================================================

struct StubRepository {
    delay: std::time::Duration,
    fail: bool,
}

#[async_trait]
impl CompanyRepository for StubRepository {
    async fn create(&self, company: &Company) -> anyhow::Result<Company> {
        Ok(company.clone())
    }

    async fn get_by_id(&self, _id: i64) -> anyhow::Result<Option<Company>> {
        Ok(None)
    }

    async fn get_by_email(&self, _email: &str) -> anyhow::Result<Option<Company>> {
        Ok(None)
    }

    async fn save_profile(&self, _id: i64, _data: &CompanyData) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn find_near(&self, _filter: &GeoFilter) -> anyhow::Result<Vec<GeoCandidate>> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            anyhow::bail!("connection reset");
        }
        Ok(Vec::new())
    }
}

fn stub_service(delay_ms: u64, fail: bool, timeout_ms: u64) -> CompanySearchService {
    CompanySearchService::new(
        Arc::new(StubRepository {
            delay: std::time::Duration::from_millis(delay_ms),
            fail,
        }),
        Arc::new(FixedClock::new(monday_ten())),
        BusinessHoursEvaluator::utc(),
    )
    .with_timeout(Duration::from_millis(timeout_ms))
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let service = stub_service(500, false, 20);
    let err = service
        .find_companies(input(100.0, 1, SortKey::Distance, SortOrder::Asc))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Timeout(_)));
}

#[tokio::test]
async fn test_storage_failure_propagates() {
    let service = stub_service(0, true, 1_000);
    let err = service
        .find_companies(input(100.0, 1, SortKey::Distance, SortOrder::Asc))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Storage(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10))]

    /// Growing the radius never drops a company.
    #[test]
    fn radius_growth_is_monotonic(
        offsets in prop::collection::vec(1.0f64..5_000.0, 1..12),
        r1 in 1.0f64..5_000.0,
        extra in 0.0f64..5_000.0,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut fx = Fixture::new().await;
            for (i, meters) in offsets.iter().enumerate() {
                fx.add_at(&format!("C{}", i), *meters).await;
            }

            let small = fx.service
                .find_companies(input(r1, 1, SortKey::Distance, SortOrder::Asc))
                .await
                .unwrap();
            let large = fx.service
                .find_companies(input(r1 + extra, 1, SortKey::Distance, SortOrder::Asc))
                .await
                .unwrap();

            prop_assert!(small.count <= large.count);
            for company in &small.companies {
                prop_assert!(large.companies.iter().any(|c| c.name == company.name));
            }
            Ok(())
        })?;
    }
}
