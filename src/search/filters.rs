//! Search filters: query parameter parsing and the structured filter stage.

use serde::{Deserialize, Serialize};

use super::ranker::HotelSnapshot;

/// Raw, unvalidated filter values as they arrive from a query string.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterParams {
    pub location: Option<String>,
    pub min_rating: Option<String>,
    pub max_price: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub keyword: Option<String>,
}

impl FilterParams {
    /// Collect filter params from decoded `key=value` pairs.
    /// `amenities` may repeat; unknown keys are skipped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = FilterParams::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "location" => params.location = Some(value.into()),
                "min_rating" => params.min_rating = Some(value.into()),
                "max_price" => params.max_price = Some(value.into()),
                "amenities" => params.amenities.push(value.into()),
                "keyword" => params.keyword = Some(value.into()),
                _ => {}
            }
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid value for {field}: {value:?}")]
    InvalidFilterValue { field: &'static str, value: String },
}

/// Validated search filters. Absent fields are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchFilters {
    pub location: Option<String>,
    pub min_rating: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub keyword: Option<String>,
}

impl SearchFilters {
    /// Build filters from raw params.
    ///
    /// Blank values count as absent. A rating or price that is not a finite
    /// number is dropped with a warning instead of failing the search.
    pub fn parse(params: &FilterParams) -> Self {
        let min_rating = parse_number("min_rating", params.min_rating.as_deref())
            .unwrap_or_else(|err| {
                log::warn!("ignoring filter: {err}");
                None
            });
        let max_price = parse_number("max_price", params.max_price.as_deref())
            .unwrap_or_else(|err| {
                log::warn!("ignoring filter: {err}");
                None
            });

        let mut amenities: Vec<String> = vec![];
        for amenity in &params.amenities {
            let amenity = amenity.trim().to_lowercase();
            if !amenity.is_empty() && !amenities.contains(&amenity) {
                amenities.push(amenity);
            }
        }

        SearchFilters {
            location: non_blank(params.location.as_deref()),
            min_rating,
            max_price,
            amenities,
            keyword: non_blank(params.keyword.as_deref()),
        }
    }

    /// The keyword to rank by, if any.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Structured filter stage.
    ///
    /// Narrows the corpus by location, minimum rating, amenities and maximum
    /// price, in that order. The amenity filter keeps hotels having at least
    /// one requested amenity and orders them by how many they have; otherwise
    /// corpus order is kept.
    pub fn apply<'a>(&self, corpus: &'a [HotelSnapshot]) -> Vec<&'a HotelSnapshot> {
        let mut candidates: Vec<&HotelSnapshot> = corpus.iter().collect();

        if let Some(location) = &self.location {
            let location = location.to_lowercase();
            candidates.retain(|s| s.hotel.location.to_lowercase().contains(&location));
        }

        if let Some(min_rating) = self.min_rating {
            candidates.retain(|s| s.hotel.rating >= min_rating);
        }

        if !self.amenities.is_empty() {
            let mut counted: Vec<(usize, &HotelSnapshot)> = candidates
                .into_iter()
                .map(|s| (self.amenity_matches(s), s))
                .filter(|(count, _)| *count > 0)
                .collect();

            // stable: equal counts keep their relative order
            counted.sort_by(|a, b| b.0.cmp(&a.0));
            candidates = counted.into_iter().map(|(_, s)| s).collect();
        }

        if let Some(max_price) = self.max_price {
            candidates.retain(|s| s.room_prices.iter().any(|price| *price <= max_price));
        }

        candidates
    }

    /// Number of requested amenities the hotel has, compared case-insensitively.
    pub fn amenity_matches(&self, snapshot: &HotelSnapshot) -> usize {
        let hotel_amenities: Vec<String> = snapshot
            .hotel
            .amenities
            .iter()
            .map(|a| a.to_lowercase())
            .collect();

        self.amenities
            .iter()
            .map(|wanted| wanted.trim().to_lowercase())
            .filter(|wanted| hotel_amenities.iter().any(|a| a == wanted))
            .count()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn parse_number(field: &'static str, raw: Option<&str>) -> Result<Option<f64>, FilterError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(FilterError::InvalidFilterValue {
            field,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotels::Hotel;

    fn snapshot(id: u64, location: &str, rating: f64, amenities: &[&str], prices: &[f64]) -> HotelSnapshot {
        HotelSnapshot {
            hotel: Hotel {
                id,
                name: format!("Hotel {id}"),
                location: location.to_string(),
                rating,
                amenities: amenities.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            },
            room_prices: prices.to_vec(),
        }
    }

    fn ids(result: &[&HotelSnapshot]) -> Vec<u64> {
        result.iter().map(|s| s.hotel.id).collect()
    }

    #[test]
    fn test_parse_ignores_invalid_numbers() {
        let params = FilterParams {
            min_rating: Some("four".to_string()),
            max_price: Some("150".to_string()),
            ..Default::default()
        };

        let filters = SearchFilters::parse(&params);
        assert_eq!(filters.min_rating, None);
        assert_eq!(filters.max_price, Some(150.0));
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        assert!(parse_number("max_price", Some("NaN")).is_err());
        assert!(parse_number("max_price", Some("inf")).is_err());
        assert_eq!(parse_number("max_price", Some("  ")), Ok(None));
    }

    #[test]
    fn test_parse_blank_values_are_absent() {
        let params = FilterParams {
            location: Some("  ".to_string()),
            keyword: Some("".to_string()),
            amenities: vec!["".to_string(), " Pool ".to_string(), "pool".to_string()],
            ..Default::default()
        };

        let filters = SearchFilters::parse(&params);
        assert_eq!(filters.location, None);
        assert_eq!(filters.keyword(), None);
        assert_eq!(filters.amenities, vec!["pool".to_string()]);
    }

    #[test]
    fn test_from_pairs_collects_repeated_amenities() {
        let params = FilterParams::from_pairs(vec![
            ("location", "Goa"),
            ("amenities", "pool"),
            ("amenities", "gym"),
            ("page", "2"),
        ]);

        assert_eq!(params.location.as_deref(), Some("Goa"));
        assert_eq!(params.amenities, vec!["pool", "gym"]);
    }

    #[test]
    fn test_location_case_insensitive_substring() {
        let corpus = vec![
            snapshot(1, "New York", 4.5, &[], &[120.0]),
            snapshot(2, "Miami", 4.0, &[], &[200.0]),
            snapshot(3, "York", 3.0, &[], &[90.0]),
        ];

        let filters = SearchFilters {
            location: Some("YORK".to_string()),
            ..Default::default()
        };

        assert_eq!(ids(&filters.apply(&corpus)), vec![1, 3]);
    }

    #[test]
    fn test_min_rating_inclusive() {
        let corpus = vec![
            snapshot(1, "Delhi", 4.0, &[], &[]),
            snapshot(2, "Delhi", 4.5, &[], &[]),
        ];

        let filters = SearchFilters {
            min_rating: Some(4.5),
            ..Default::default()
        };

        assert_eq!(ids(&filters.apply(&corpus)), vec![2]);
    }

    #[test]
    fn test_amenities_ordered_by_match_count() {
        let corpus = vec![
            snapshot(1, "Goa", 4.0, &["pool"], &[]),
            snapshot(2, "Goa", 4.0, &["spa"], &[]),
            snapshot(3, "Goa", 4.0, &["Pool", "GYM", "wifi"], &[]),
            snapshot(4, "Goa", 4.0, &["gym"], &[]),
        ];

        let filters = SearchFilters {
            amenities: vec!["pool".to_string(), "gym".to_string()],
            ..Default::default()
        };

        // 3 matches both; 1 and 4 match one each and keep corpus order
        assert_eq!(ids(&filters.apply(&corpus)), vec![3, 1, 4]);
    }

    #[test]
    fn test_amenities_without_populated_hotels() {
        let corpus = vec![snapshot(1, "Goa", 4.0, &[], &[]), snapshot(2, "Goa", 4.0, &[], &[])];

        let filters = SearchFilters {
            amenities: vec!["pool".to_string()],
            ..Default::default()
        };

        assert!(filters.apply(&corpus).is_empty());
    }

    #[test]
    fn test_max_price_any_room() {
        let corpus = vec![
            snapshot(1, "Jaipur", 4.0, &[], &[250.0, 180.0]),
            snapshot(2, "Jaipur", 4.0, &[], &[250.0, 200.0]),
            snapshot(3, "Jaipur", 4.0, &[], &[]),
        ];

        let filters = SearchFilters {
            max_price: Some(180.0),
            ..Default::default()
        };

        assert_eq!(ids(&filters.apply(&corpus)), vec![1]);
    }

    #[test]
    fn test_filters_compose() {
        let corpus = vec![
            snapshot(1, "Mumbai", 4.6, &["pool"], &[300.0]),
            snapshot(2, "Mumbai", 4.8, &["pool", "spa"], &[150.0]),
            snapshot(3, "Chennai", 4.9, &["pool", "spa"], &[100.0]),
            snapshot(4, "Mumbai", 3.9, &["pool", "spa"], &[100.0]),
        ];

        let filters = SearchFilters {
            location: Some("mumbai".to_string()),
            min_rating: Some(4.5),
            max_price: Some(200.0),
            amenities: vec!["spa".to_string()],
            keyword: None,
        };

        assert_eq!(ids(&filters.apply(&corpus)), vec![2]);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let corpus = vec![
            snapshot(1, "Kochi", 4.1, &["wifi"], &[80.0]),
            snapshot(2, "Kochi", 4.7, &["wifi", "pool"], &[120.0]),
            snapshot(3, "Kochi Port", 3.2, &["pool"], &[60.0]),
            snapshot(4, "Udaipur", 4.9, &["pool"], &[60.0]),
        ];

        let filter_sets = vec![
            SearchFilters::default(),
            SearchFilters {
                location: Some("kochi".to_string()),
                ..Default::default()
            },
            SearchFilters {
                amenities: vec!["pool".to_string(), "wifi".to_string()],
                max_price: Some(100.0),
                ..Default::default()
            },
            SearchFilters {
                location: Some("k".to_string()),
                min_rating: Some(4.0),
                amenities: vec!["wifi".to_string()],
                max_price: Some(500.0),
                keyword: None,
            },
        ];

        for filters in filter_sets {
            let once: Vec<HotelSnapshot> = filters.apply(&corpus).into_iter().cloned().collect();
            let twice = filters.apply(&once);
            assert_eq!(ids(&twice), once.iter().map(|s| s.hotel.id).collect::<Vec<_>>());
        }
    }
}
