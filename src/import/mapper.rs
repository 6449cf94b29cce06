//! Field mapper: raw CSV rows to [`ProductRecord`]s.
//!
//! Every coercion returns a [`Coerced`] so a clean parse can be told apart from
//! a substituted default. Alias tables for categories, brands and goals live
//! here as `match` expressions over the upper-cased input.

use serde::{de::Error as _, Deserializer};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;
use crate::domain::value_objects::{Coerced, Slug};
use crate::{ProductRecord, Variant};

pub const DEFAULT_PRICE: f64 = 1000.0;
pub const DEFAULT_CATEGORY: &str = "Health Supplements";
pub const DEFAULT_BRAND: &str = "O2 NUTRITION";
/// Rows with fewer columns are dropped without an error.
pub const MIN_COLUMNS: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Name, Price, OriginalPrice, Category, Subcategory, Brand, Description, MainImage,
    Rating, Reviews, ShopByGoal, SimpleFlavors, Variants, Slug,
    Featured, Trending, BestSeller, LovedByExperts, OnSale,
    NutritionInfo, Ingredients, Certifications, NutritionImage, Images, Weight,
}

/// Column order assumed when a file has no header row.
pub const DEFAULT_HEADERS: [Field; 25] = [
    Field::Name, Field::Price, Field::OriginalPrice, Field::Category, Field::Subcategory,
    Field::Brand, Field::Description, Field::MainImage, Field::Rating, Field::Reviews,
    Field::ShopByGoal, Field::SimpleFlavors, Field::Variants, Field::Slug,
    Field::Featured, Field::Trending, Field::BestSeller, Field::LovedByExperts, Field::OnSale,
    Field::NutritionInfo, Field::Ingredients, Field::Certifications, Field::NutritionImage,
    Field::Images, Field::Weight,
];

impl Field {
    pub fn from_header(header: &str) -> Option<Self> {
        let f = match header.trim().to_ascii_lowercase().as_str() {
            "name" => Self::Name,
            "price" => Self::Price,
            "originalprice" => Self::OriginalPrice,
            "category" => Self::Category,
            "subcategory" => Self::Subcategory,
            "brand" => Self::Brand,
            "description" => Self::Description,
            "mainimage" => Self::MainImage,
            "rating" => Self::Rating,
            "reviews" => Self::Reviews,
            "shopbygoal" => Self::ShopByGoal,
            "simpleflavors" => Self::SimpleFlavors,
            "variants" => Self::Variants,
            "slug" => Self::Slug,
            "featured" => Self::Featured,
            "trending" => Self::Trending,
            "bestseller" => Self::BestSeller,
            "lovedbyexperts" => Self::LovedByExperts,
            "onsale" => Self::OnSale,
            "nutritioninfo" => Self::NutritionInfo,
            "ingredients" => Self::Ingredients,
            "certifications" => Self::Certifications,
            "nutritionimage" => Self::NutritionImage,
            "images" => Self::Images,
            "weight" => Self::Weight,
            _ => return None,
        };
        Some(f)
    }
}

/// Where each field sits in a row.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnLayout {
    columns: HashMap<Field, usize>,
    width: usize,
}

impl ColumnLayout {
    pub fn positional() -> Self {
        Self { columns: DEFAULT_HEADERS.iter().enumerate().map(|(i, f)| (*f, i)).collect(), width: DEFAULT_HEADERS.len() }
    }

    /// Layout read from a header row. Unknown headers are ignored; the first
    /// occurrence of a repeated header wins.
    pub fn from_header_row(headers: &[String]) -> Self {
        let mut columns = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            match Field::from_header(h) {
                Some(f) => { columns.entry(f).or_insert(i); }
                None => tracing::debug!(header = %h, "ignoring unknown column"),
            }
        }
        Self { columns, width: headers.len() }
    }

    pub fn has(&self, field: Field) -> bool { self.columns.contains_key(&field) }

    pub fn min_columns(&self) -> usize { MIN_COLUMNS.min(self.width).max(1) }

    /// Cell for `field`, or `None` when the layout lacks the column or the row is short.
    pub fn get<'r>(&self, row: &'r [String], field: Field) -> Option<&'r str> {
        self.columns.get(&field).and_then(|i| row.get(*i)).map(String::as_str)
    }
}

/// True when the second column of `row` is numeric, i.e. the row is data
/// (a price) rather than a header. A header literally named `2` reads as data.
pub fn looks_like_data_row(row: &[String]) -> bool {
    row.get(1).is_some_and(|v| parse_number(v).is_some())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("missing product name")]
    MissingName,
    #[error("missing price column")]
    MissingPrice,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappedRow {
    pub record: ProductRecord,
    /// Fields that fell back to a default.
    pub defaults: Vec<&'static str>,
}

#[derive(Clone, Debug)]
pub struct FieldMapper {
    layout: ColumnLayout,
}

impl FieldMapper {
    pub fn new(layout: ColumnLayout) -> Self { Self { layout } }

    pub fn layout(&self) -> &ColumnLayout { &self.layout }

    pub fn map_row(&self, row: &[String]) -> Result<MappedRow, RowError> {
        let name = self.text(row, Field::Name).ok_or(RowError::MissingName)?;
        let raw_price = self.layout.get(row, Field::Price).ok_or(RowError::MissingPrice)?;
        let mut defaults = Vec::new();
        let mut note = |field: &'static str, used_default: bool| if used_default { defaults.push(field) };

        let price = coerce_price(raw_price);
        note("price", price.used_default);
        let original_price = coerce_optional_number(self.raw(row, Field::OriginalPrice));
        note("originalPrice", original_price.used_default);
        let rating = coerce_rating(self.raw(row, Field::Rating));
        note("rating", rating.used_default);
        let reviews = coerce_count(self.raw(row, Field::Reviews));
        note("reviews", reviews.used_default);
        let category = canonical_category(self.raw(row, Field::Category));
        note("category", category.used_default);
        let brand = canonical_brand(self.raw(row, Field::Brand));
        note("brand", brand.used_default);
        let goal = canonical_goal(self.raw(row, Field::ShopByGoal));
        note("shopByGoal", goal.used_default);
        let variants = parse_variants(self.raw(row, Field::Variants));
        note("variants", variants.used_default);

        let slug = match self.text(row, Field::Slug) {
            Some(s) => Slug::new(&s).unwrap_or_else(|| { note("slug", true); Slug::from_name(&name) }),
            None => Slug::from_name(&name),
        };

        let record = ProductRecord {
            slug: slug.into_inner(),
            price: price.value,
            original_price: original_price.value,
            category: category.value.to_string(),
            subcategory: self.text(row, Field::Subcategory),
            brand: brand.value.to_string(),
            description: self.text(row, Field::Description),
            image_url: self.text(row, Field::MainImage),
            images: split_list(self.raw(row, Field::Images)),
            rating: rating.value,
            reviews: reviews.value,
            featured: parse_flag(self.raw(row, Field::Featured)),
            trending: parse_flag(self.raw(row, Field::Trending)),
            best_seller: parse_flag(self.raw(row, Field::BestSeller)),
            loved_by_experts: parse_flag(self.raw(row, Field::LovedByExperts)),
            on_sale: parse_flag(self.raw(row, Field::OnSale)),
            shop_by_goal: goal.value.map(str::to_string),
            simple_flavors: join_flavors(self.raw(row, Field::SimpleFlavors)),
            variants: variants.value,
            weight: self.text(row, Field::Weight),
            nutrition_info: self.text(row, Field::NutritionInfo),
            ingredients: self.text(row, Field::Ingredients),
            certifications: self.text(row, Field::Certifications),
            nutrition_image: self.text(row, Field::NutritionImage),
            name,
        };
        Ok(MappedRow { record, defaults })
    }

    fn raw<'r>(&self, row: &'r [String], field: Field) -> &'r str {
        self.layout.get(row, field).unwrap_or("")
    }

    fn text(&self, row: &[String], field: Field) -> Option<String> {
        Some(self.raw(row, field).trim()).filter(|s| !s.is_empty()).map(str::to_string)
    }
}

// =============================================================================
// Coercions
// =============================================================================

/// Parses a finite number, tolerating a leading currency sign and thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().trim_start_matches(['₹', '$']).chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Unparseable or negative prices fall back to [`DEFAULT_PRICE`].
pub fn coerce_price(raw: &str) -> Coerced<f64> {
    match parse_number(raw) {
        Some(v) if v >= 0.0 => Coerced::clean(v),
        _ => Coerced::defaulted(DEFAULT_PRICE),
    }
}

/// Ratings outside 0..=5 are dropped.
pub fn coerce_rating(raw: &str) -> Coerced<Option<f64>> {
    let n = coerce_optional_number(raw);
    match n.value {
        Some(v) if !(0.0..=5.0).contains(&v) => Coerced::defaulted(None),
        _ => n,
    }
}

/// Empty input is a clean absence; unparseable input is a defaulted absence.
pub fn coerce_optional_number(raw: &str) -> Coerced<Option<f64>> {
    if raw.trim().is_empty() { return Coerced::clean(None); }
    match parse_number(raw) {
        Some(v) => Coerced::clean(Some(v)),
        None => Coerced::defaulted(None),
    }
}

pub fn coerce_count(raw: &str) -> Coerced<Option<u32>> {
    let n = coerce_optional_number(raw);
    match n.value {
        None => Coerced { value: None, used_default: n.used_default },
        Some(v) if (0.0..=u32::MAX as f64).contains(&v) => Coerced::clean(Some(v.round() as u32)),
        Some(_) => Coerced::defaulted(None),
    }
}

pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Embedded JSON array of variants. Malformed JSON yields no variants.
pub fn parse_variants(raw: &str) -> Coerced<Vec<Variant>> {
    let raw = raw.trim();
    if raw.is_empty() { return Coerced::clean(Vec::new()); }
    match serde_json::from_str::<Vec<Variant>>(raw) {
        Ok(v) => Coerced::clean(v),
        Err(e) => {
            warn!(error = %e, input = raw, "malformed variants JSON, importing without variants");
            Coerced::defaulted(Vec::new())
        }
    }
}

/// Variant prices arrive as JSON numbers or numeric strings.
pub fn deserialize_price<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match <serde_json::Value as serde::Deserialize>::deserialize(d)? {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| D::Error::custom("price out of range")),
        serde_json::Value::String(s) => parse_number(&s).ok_or_else(|| D::Error::custom(format!("invalid price `{s}`"))),
        other => Err(D::Error::custom(format!("invalid price {other}"))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(['|', ';', ',']).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn join_flavors(raw: &str) -> Option<String> {
    let flavors: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if flavors.is_empty() { None } else { Some(flavors.join(", ")) }
}

fn alias_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

// =============================================================================
// Alias tables
// =============================================================================

pub fn canonical_category(raw: &str) -> Coerced<&'static str> {
    let category = match alias_key(raw).as_str() {
        "PROTEIN" | "PROTEINS" | "WHEY" | "WHEY PROTEIN" | "WHEY ISOLATE" | "ISOLATE" | "CASEIN" | "PLANT PROTEIN" => "Protein",
        "GAINER" | "GAINERS" | "MASS GAINER" | "MASS GAINERS" | "WEIGHT GAINER" | "WEIGHT GAINERS" => "Gainers",
        "PRE-WORKOUT" | "PRE WORKOUT" | "PREWORKOUT" => "Pre-Workout",
        "CREATINE" | "CREATINE MONOHYDRATE" => "Creatine",
        "AMINO" | "AMINOS" | "AMINO ACIDS" | "BCAA" | "BCAAS" | "EAA" | "GLUTAMINE" => "Amino Acids",
        "FAT BURNER" | "FAT BURNERS" | "L-CARNITINE" | "WEIGHT LOSS" => "Fat Burners",
        "VITAMINS" | "MULTIVITAMIN" | "MULTIVITAMINS" | "MINERALS" | "VITAMINS & MINERALS" | "OMEGA 3" | "FISH OIL" => "Vitamins & Minerals",
        "HEALTH" | "HEALTH SUPPLEMENTS" | "WELLNESS" | "AYURVEDA" => "Health Supplements",
        _ => return Coerced::defaulted(DEFAULT_CATEGORY),
    };
    Coerced::clean(category)
}

pub fn canonical_brand(raw: &str) -> Coerced<&'static str> {
    let brand = match alias_key(raw).as_str() {
        "ON" | "OPTIMUM" | "OPTIMUM NUTRITION" | "ON (OPTIMUM NUTRITION)" => "ON (OPTIMUM NUTRITION)",
        "MUSCLETECH" | "MUSCLE TECH" => "MUSCLETECH",
        "MUSCLEBLAZE" | "MUSCLE BLAZE" | "MB" => "MUSCLEBLAZE",
        "DYMATIZE" => "DYMATIZE",
        "MYPROTEIN" | "MY PROTEIN" => "MYPROTEIN",
        "BSN" => "BSN",
        "GNC" => "GNC",
        "ULTIMATE NUTRITION" | "UN" => "ULTIMATE NUTRITION",
        "ISOPURE" => "ISOPURE",
        "RONNIE COLEMAN" | "RONNIE COLEMAN SIGNATURE SERIES" => "RONNIE COLEMAN",
        "O2" | "O2 NUTRITION" => "O2 NUTRITION",
        _ => return Coerced::defaulted(DEFAULT_BRAND),
    };
    Coerced::clean(brand)
}

/// Empty input is a clean absence; unmapped input is left absent but flagged.
pub fn canonical_goal(raw: &str) -> Coerced<Option<&'static str>> {
    let goal = match alias_key(raw).as_str() {
        "" => return Coerced::clean(None),
        "BUILD MUSCLE" | "BUILD-MUSCLE" | "MUSCLE BUILDING" | "MUSCLE GAIN" | "LEAN MUSCLE" => "build-muscle",
        "WEIGHT LOSS" | "WEIGHT-LOSS" | "FAT LOSS" | "LOSE WEIGHT" => "weight-loss",
        "WEIGHT GAIN" | "WEIGHT-GAIN" | "MASS GAIN" | "GAIN WEIGHT" => "weight-gain",
        "ENDURANCE" | "STAMINA" | "PERFORMANCE" | "STRENGTH & ENDURANCE" => "endurance",
        _ => return Coerced::defaulted(None),
    };
    Coerced::clean(Some(goal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parser::parse_line;
    use crate::domain::value_objects::slugify;

    fn positional() -> FieldMapper { FieldMapper::new(ColumnLayout::positional()) }

    #[test]
    fn test_scenario_positional_row() {
        let row = parse_line("Whey Protein,1999,2499,PROTEIN,,MUSCLETECH,Great product,http://img,,,,,,,TRUE,FALSE,TRUE,FALSE,FALSE");
        let mapped = positional().map_row(&row).unwrap();
        let r = mapped.record;
        assert_eq!(r.name, "Whey Protein");
        assert_eq!(r.slug, "whey-protein");
        assert_eq!(r.price, 1999.0);
        assert_eq!(r.original_price, Some(2499.0));
        assert_eq!(r.category, "Protein");
        assert_eq!(r.brand, "MUSCLETECH");
        assert_eq!(r.description.as_deref(), Some("Great product"));
        assert_eq!(r.image_url.as_deref(), Some("http://img"));
        assert!(r.featured && r.best_seller);
        assert!(!r.trending && !r.loved_by_experts && !r.on_sale);
        assert!(r.subcategory.is_none() && r.rating.is_none() && r.variants.is_empty());
        assert!(mapped.defaults.is_empty());
    }

    #[test]
    fn test_malformed_variants_default_to_empty() {
        let row = parse_line(r#"Casein,1500,,PROTEIN,,ON,,,,,,,"[{flavor:choc}]""#);
        let mapped = positional().map_row(&row).unwrap();
        assert!(mapped.record.variants.is_empty());
        assert_eq!(mapped.defaults, vec!["variants"]);
    }

    #[test]
    fn test_variants_json() {
        let v = parse_variants(r#"[{"flavor":"Chocolate","weight":"1kg","price":1999},{"flavor":"Vanilla","weight":"2kg","price":"3,499"}]"#);
        assert!(!v.used_default);
        assert_eq!(v.value.len(), 2);
        assert_eq!(v.value[1].price, 3499.0);
        assert_eq!(v.value[0].flavor, "Chocolate");
    }

    #[test]
    fn test_unparseable_price_defaults() {
        for raw in ["abc", "", "NaN", "inf", "12..5"] {
            let c = coerce_price(raw);
            assert_eq!(c.value, DEFAULT_PRICE, "input {raw:?}");
            assert!(c.used_default);
        }
        assert_eq!(coerce_price(" ₹1,299.50 ").value, 1299.5);
        assert_eq!(coerce_price("-5"), Coerced::defaulted(DEFAULT_PRICE));
        assert_eq!(coerce_price("0"), Coerced::clean(0.0));
        let row = parse_line("Whey,free,,,,ON");
        let mapped = positional().map_row(&row).unwrap();
        assert_eq!(mapped.record.price, DEFAULT_PRICE);
        assert!(mapped.defaults.contains(&"price"));
    }

    #[test]
    fn test_out_of_range_values_are_defaulted() {
        let mapped = positional().map_row(&parse_line("Rated,-5,,,,ON,,,9")).unwrap();
        assert_eq!(mapped.record.price, DEFAULT_PRICE);
        assert_eq!(mapped.record.rating, None);
        assert!(mapped.defaults.contains(&"price") && mapped.defaults.contains(&"rating"));
    }

    #[test]
    fn test_flags() {
        for t in ["TRUE", "true", "1", "yes", "YES", "Yes"] { assert!(parse_flag(t), "{t}"); }
        for f in ["", "false", "0", "no", "y", "truthy"] { assert!(!parse_flag(f), "{f}"); }
    }

    #[test]
    fn test_missing_required_fields() {
        let m = positional();
        assert_eq!(m.map_row(&parse_line(",1999,,,,ON")), Err(RowError::MissingName));
        let layout = ColumnLayout::from_header_row(&parse_line("name,brand,category"));
        assert_eq!(FieldMapper::new(layout).map_row(&parse_line("Whey,ON,PROTEIN")), Err(RowError::MissingPrice));
        assert_eq!(m.map_row(&["Whey".to_string()]), Err(RowError::MissingPrice));
    }

    #[test]
    fn test_header_layout() {
        let layout = ColumnLayout::from_header_row(&parse_line("Brand, NAME ,Price,Featured,Unknown,Variants"));
        assert!(!layout.has(Field::Rating));
        assert_eq!(layout.min_columns(), 6);
        let row = parse_line(r#"optimum nutrition,Gold Standard,3299,yes,x,"[{""flavor"":""Mocha"",""weight"":""2lb"",""price"":3299}]""#);
        let r = FieldMapper::new(layout).map_row(&row).unwrap().record;
        assert_eq!(r.name, "Gold Standard");
        assert_eq!(r.brand, "ON (OPTIMUM NUTRITION)");
        assert_eq!(r.price, 3299.0);
        assert!(r.featured);
        assert_eq!(r.variants, vec![Variant { flavor: "Mocha".into(), weight: "2lb".into(), price: 3299.0 }]);
        assert_eq!(r.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_narrow_header_lowers_minimum() {
        let layout = ColumnLayout::from_header_row(&parse_line("name,price"));
        assert_eq!(layout.min_columns(), 2);
    }

    #[test]
    fn test_looks_like_data_row() {
        assert!(looks_like_data_row(&parse_line("Whey,1999,2499")));
        assert!(looks_like_data_row(&parse_line("Whey,12.5")));
        assert!(!looks_like_data_row(&parse_line("name,price,originalPrice")));
        assert!(!looks_like_data_row(&parse_line("Whey,,2499")));
        assert!(!looks_like_data_row(&parse_line("Whey")));
        // A header literally named "2" is indistinguishable from a price.
        assert!(looks_like_data_row(&parse_line("name,2,brand")));
    }

    #[test]
    fn test_alias_tables() {
        assert_eq!(canonical_category("  mass   gainer ").value, "Gainers");
        let c = canonical_category("Snacks");
        assert_eq!((c.value, c.used_default), (DEFAULT_CATEGORY, true));
        assert!(canonical_category("").used_default);
        assert_eq!(canonical_brand("Optimum Nutrition").value, "ON (OPTIMUM NUTRITION)");
        assert_eq!(canonical_brand("acme").value, DEFAULT_BRAND);
        assert_eq!(canonical_goal("fat loss").value, Some("weight-loss"));
        assert_eq!(canonical_goal(""), Coerced::clean(None));
        assert_eq!(canonical_goal("sleep"), Coerced::defaulted(None));
    }

    #[test]
    fn test_optional_numbers() {
        assert_eq!(coerce_optional_number(""), Coerced::clean(None));
        assert_eq!(coerce_optional_number("4.5"), Coerced::clean(Some(4.5)));
        assert_eq!(coerce_optional_number("n/a"), Coerced::defaulted(None));
        assert_eq!(coerce_rating("5"), Coerced::clean(Some(5.0)));
        assert_eq!(coerce_rating("9"), Coerced::defaulted(None));
        assert_eq!(coerce_rating("-1"), Coerced::defaulted(None));
        assert_eq!(coerce_count("120"), Coerced::clean(Some(120)));
        assert_eq!(coerce_count("-3"), Coerced::defaulted(None));
        assert_eq!(coerce_count("lots"), Coerced::defaulted(None));
    }

    #[test]
    fn test_slug_column_and_lists() {
        let row = parse_line(r#"Creatine 250g,899,,CREATINE,,MB,,,4.6,312,muscle gain,"Unflavoured, Lemon",,My Creatine!!,,,,,,,,,,"a.jpg|b.jpg",250g"#);
        let r = positional().map_row(&row).unwrap().record;
        assert_eq!(r.slug, "my-creatine");
        assert_eq!(slugify(&r.slug), r.slug);
        assert_eq!(r.simple_flavors.as_deref(), Some("Unflavoured, Lemon"));
        assert_eq!(r.images, vec!["a.jpg", "b.jpg"]);
        assert_eq!(r.weight.as_deref(), Some("250g"));
        assert_eq!(r.shop_by_goal.as_deref(), Some("build-muscle"));
        assert_eq!(r.reviews, Some(312));
        assert_eq!(r.rating, Some(4.6));
    }
}
