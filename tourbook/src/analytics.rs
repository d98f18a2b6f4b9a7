//! Tour read models
//!
//! Aliased list (`top-5-cheap`), statistics grouped by difficulty, the
//! monthly start plan for a year, and the two geo queries. Statistics are
//! folded over the visible tours fetched through [`DocumentStore::find`],
//! so they work the same against every store.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::context::RequestContext;
use crate::handlers::{ApiError, ItemResponse, ListResponse, ResourceHandlers, SUCCESS};
use crate::query::{scope_filter, scope_projection, QueryParams};
use crate::repository::{Document, DocumentStore, Filter, FilterCondition, FindQuery};
use crate::resources::{Resource, Tour};
use crate::schema::{number_value, parse_date};
use crate::state::AppState;

/// Earth radius in miles, for `mi` distances
pub const EARTH_RADIUS_MI: f64 = 3963.2;

/// Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6378.1;

const METERS_TO_MILES: f64 = 0.000621371;
const METERS_TO_KM: f64 = 0.001;

const BAD_LATLNG: &str = "Please provide latitude and longitude in the format lat,lng.";

/// Parameters forced by `GET /tours/top-5-cheap`
pub const TOP_CHEAP_PARAMS: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Distance unit of the geo routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Miles (`mi`)
    Miles,
    /// Kilometres (anything else)
    Kilometres,
}

impl Unit {
    /// `mi` means miles; every other value means kilometres
    pub fn parse(raw: &str) -> Self {
        if raw == "mi" {
            Self::Miles
        } else {
            Self::Kilometres
        }
    }

    /// Earth radius in this unit
    pub fn earth_radius(self) -> f64 {
        match self {
            Self::Miles => EARTH_RADIUS_MI,
            Self::Kilometres => EARTH_RADIUS_KM,
        }
    }

    /// Factor turning meters into this unit
    pub fn from_meters(self) -> f64 {
        match self {
            Self::Miles => METERS_TO_MILES,
            Self::Kilometres => METERS_TO_KM,
        }
    }
}

/// A point on the globe in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Parse `lat,lng`
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let (lat, lng) = raw
            .split_once(',')
            .ok_or_else(|| ApiError::bad_request(BAD_LATLNG))?;
        match (lat.trim().parse::<f64>(), lng.trim().parse::<f64>()) {
            (Ok(lat), Ok(lng)) if lat.is_finite() && lng.is_finite() => Ok(Self { lat, lng }),
            _ => Err(ApiError::bad_request(BAD_LATLNG)),
        }
    }

    /// Read a GeoJSON point (`[lng, lat]`)
    pub fn from_geojson(point: &Value) -> Option<Self> {
        let coordinates = point.get("coordinates")?.as_array()?;
        match coordinates.as_slice() {
            [lng, lat, ..] => Some(Self {
                lat: lat.as_f64()?,
                lng: lng.as_f64()?,
            }),
            _ => None,
        }
    }

    /// Central angle to `other` in radians (haversine)
    pub fn angle_to(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }

    /// Distance to `other` in meters
    pub fn meters_to(&self, other: &Self) -> f64 {
        self.angle_to(other) * EARTH_RADIUS_KM * 1000.0
    }
}

/// One difficulty bucket of `tour-stats`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    #[serde(rename = "_id")]
    pub difficulty: String,
    pub num_tours: u64,
    pub num_ratings: Value,
    pub avg_rating: Value,
    pub avg_price: Value,
    pub min_price: Value,
    pub max_price: Value,
}

/// One month of `monthly-plan`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    pub month: u32,
    pub num_tour_starts: u64,
    pub tours: Vec<String>,
}

#[derive(Default)]
struct Accumulator {
    tours: u64,
    ratings: f64,
    rating_sum: f64,
    price_sum: f64,
    prices: u64,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

fn number(doc: &Document, field: &str) -> Option<f64> {
    doc.get(field).and_then(Value::as_f64)
}

fn optional_number(value: Option<f64>) -> Value {
    value.map(number_value).unwrap_or(Value::Null)
}

/// Group tours by upper-cased difficulty, cheapest average first
pub fn tour_stats(tours: &[Document]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for tour in tours {
        let difficulty = tour
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        let acc = groups.entry(difficulty).or_default();
        acc.tours += 1;
        acc.ratings += number(tour, "ratingsQuantity").unwrap_or(0.0);
        acc.rating_sum += number(tour, "ratingsAverage").unwrap_or(0.0);
        if let Some(price) = number(tour, "price") {
            acc.price_sum += price;
            acc.prices += 1;
            acc.min_price = Some(acc.min_price.map_or(price, |min| min.min(price)));
            acc.max_price = Some(acc.max_price.map_or(price, |max| max.max(price)));
        }
    }

    let mut stats: Vec<(Option<f64>, DifficultyStats)> = groups
        .into_iter()
        .map(|(difficulty, acc)| {
            let avg_price = (acc.prices > 0).then(|| acc.price_sum / acc.prices as f64);
            let stats = DifficultyStats {
                difficulty,
                num_tours: acc.tours,
                num_ratings: number_value(acc.ratings),
                avg_rating: number_value(acc.rating_sum / acc.tours as f64),
                avg_price: optional_number(avg_price),
                min_price: optional_number(acc.min_price),
                max_price: optional_number(acc.max_price),
            };
            (avg_price, stats)
        })
        .collect();
    stats.sort_by(|(a, _), (b, _)| a.unwrap_or(f64::MIN).total_cmp(&b.unwrap_or(f64::MIN)));
    stats.into_iter().map(|(_, stats)| stats).collect()
}

/// Count tour starts per month of `year`, busiest month first
pub fn monthly_plan(tours: &[Document], year: i32) -> Vec<MonthPlan> {
    use chrono::Datelike;

    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        let name = tour.get("name").and_then(Value::as_str).unwrap_or_default();
        let starts = tour
            .get("startDates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for start in starts.iter().filter_map(Value::as_str).filter_map(parse_date) {
            if start.year() == year {
                months.entry(start.month()).or_default().push(name.to_string());
            }
        }
    }

    let mut plan: Vec<MonthPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthPlan {
            month,
            num_tour_starts: tours.len() as u64,
            tours,
        })
        .collect();
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
    plan
}

async fn visible_tours<S: DocumentStore>(store: &S, extra: Filter) -> Result<Vec<Document>, ApiError> {
    let decorations = Tour::read_decorations();
    let query = FindQuery::new(scope_filter(&decorations).merge(extra))
        .projected(scope_projection(&decorations));
    Ok(store.find(Tour::COLLECTION, &query).await?)
}

/// `GET /tours/top-5-cheap`
pub async fn top_five_cheap<S: DocumentStore>(
    State(handlers): State<ResourceHandlers<Tour, S>>,
    context: RequestContext,
    mut params: QueryParams,
) -> Result<ListResponse<Document>, ApiError> {
    for (key, value) in TOP_CHEAP_PARAMS {
        params.set(key, value);
    }
    let docs = handlers.list(&params, None).await?;
    Ok(ListResponse::new(docs).with_requested_at(context.requested_at_string()))
}

/// `GET /tours/tour-stats`
pub async fn get_tour_stats<S: DocumentStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Value>, ApiError> {
    let filter = Filter::new().and(FilterCondition::gte("ratingsAverage", json!(4.5)));
    let tours = visible_tours(state.store(), filter).await?;
    let stats = tour_stats(&tours);
    tracing::debug!(tours = tours.len(), groups = stats.len(), "tour stats computed");
    Ok(Json(json!({ "status": SUCCESS, "data": { "stats": stats } })))
}

/// `GET /tours/monthly-plan/{year}`
pub async fn get_monthly_plan<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(year): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let year: i32 = year
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid year: {}", year)))?;
    let tours = visible_tours(state.store(), Filter::new()).await?;
    let plan = monthly_plan(&tours, year);
    Ok(Json(json!({ "status": SUCCESS, "data": { "plan": plan } })))
}

fn parse_distance(raw: &str) -> Result<f64, ApiError> {
    raw.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid distance: {}", raw)))
}

/// `GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit}`
pub async fn get_tours_within<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<ListResponse<Document>, ApiError> {
    let center = LatLng::parse(&latlng)?;
    let radius = parse_distance(&distance)? / Unit::parse(&unit).earth_radius();

    let mut tours: Vec<Document> = visible_tours(state.store(), Filter::new())
        .await?
        .into_iter()
        .filter(|tour| {
            tour.get("startLocation")
                .and_then(LatLng::from_geojson)
                .is_some_and(|start| center.angle_to(&start) <= radius)
        })
        .collect();
    tours.iter_mut().for_each(Tour::present);
    Ok(ListResponse::new(tours))
}

/// `GET /tours/distances/{latlng}/unit/{unit}`
pub async fn get_distances<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<ItemResponse<Vec<Value>>, ApiError> {
    let origin = LatLng::parse(&latlng)?;
    let multiplier = Unit::parse(&unit).from_meters();

    let mut distances: Vec<(f64, Value)> = visible_tours(state.store(), Filter::new())
        .await?
        .into_iter()
        .filter_map(|tour| {
            let start = tour.get("startLocation").and_then(LatLng::from_geojson)?;
            let distance = origin.meters_to(&start) * multiplier;
            let entry = json!({
                "_id": tour.get("_id").cloned().unwrap_or(Value::Null),
                "name": tour.get("name").cloned().unwrap_or(Value::Null),
                "distance": distance,
            });
            Some((distance, entry))
        })
        .collect();
    distances.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    Ok(ItemResponse::new(distances.into_iter().map(|(_, entry)| entry).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_latlng_parse() {
        let point = LatLng::parse("34.111745,-118.113491").unwrap();
        assert_eq!(point.lat, 34.111745);
        assert_eq!(point.lng, -118.113491);

        for bad in ["", "34.1", "34.1,", "north,west"] {
            let err = LatLng::parse(bad).unwrap_err();
            assert_eq!(err.message, BAD_LATLNG);
        }
    }

    #[test]
    fn test_distance_between_cities() {
        let los_angeles = LatLng { lat: 34.0522, lng: -118.2437 };
        let san_francisco = LatLng { lat: 37.7749, lng: -122.4194 };
        let km = los_angeles.meters_to(&san_francisco) * Unit::Kilometres.from_meters();
        assert!((km - 559.0).abs() < 5.0, "got {km}");
        assert_eq!(los_angeles.angle_to(&los_angeles), 0.0);
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!(Unit::parse("mi"), Unit::Miles);
        assert_eq!(Unit::parse("km"), Unit::Kilometres);
        assert_eq!(Unit::parse("furlongs").earth_radius(), EARTH_RADIUS_KM);
    }

    #[test]
    fn test_geojson_point_is_lng_lat() {
        let point = LatLng::from_geojson(&json!({"type": "Point", "coordinates": [-115.57, 51.17]}));
        assert_eq!(point, Some(LatLng { lat: 51.17, lng: -115.57 }));
        assert!(LatLng::from_geojson(&json!({"coordinates": [1]})).is_none());
    }

    #[test]
    fn test_tour_stats_groups_and_sorts() {
        let tours = vec![
            doc(json!({"difficulty": "easy", "price": 397, "ratingsAverage": 4.8, "ratingsQuantity": 6})),
            doc(json!({"difficulty": "easy", "price": 1197, "ratingsAverage": 4.6, "ratingsQuantity": 4})),
            doc(json!({"difficulty": "difficult", "price": 997, "ratingsAverage": 4.5, "ratingsQuantity": 2})),
        ];
        let stats = tour_stats(&tours);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].difficulty, "EASY");
        assert_eq!(stats[0].num_tours, 2);
        assert_eq!(stats[0].num_ratings, json!(10));
        assert_eq!(stats[0].avg_price, json!(797));
        assert_eq!(stats[0].min_price, json!(397));
        assert_eq!(stats[0].max_price, json!(1197));
        assert_eq!(stats[1].difficulty, "DIFFICULT");
        assert_eq!(stats[1].avg_price, json!(997));
    }

    #[test]
    fn test_monthly_plan_counts_starts_in_year() {
        let tours = vec![
            doc(json!({"name": "The Forest Hiker", "startDates": [
                "2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z", "2022-07-05T09:00:00.000Z"
            ]})),
            doc(json!({"name": "The Sea Explorer", "startDates": ["2021-07-19T09:00:00.000Z"]})),
            doc(json!({"name": "The Snow Adventurer"})),
        ];
        let plan = monthly_plan(&tours, 2021);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].month, 7);
        assert_eq!(plan[0].num_tour_starts, 2);
        assert_eq!(plan[0].tours, vec!["The Forest Hiker", "The Sea Explorer"]);
        assert_eq!(plan[1].month, 4);
        assert!(monthly_plan(&tours, 2030).is_empty());
    }
}
