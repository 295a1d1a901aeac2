//! Sample catalogue loaded into an empty database at start-up.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::{Category, CategoryInput, Product, ProductImage, ProductInput};

struct SampleProduct {
    name: &'static str,
    description: &'static str,
    price: Decimal,
    category: &'static str,
    subcategory: &'static str,
    brand: &'static str,
    sku: &'static str,
    image: (&'static str, &'static str),
    specifications: &'static [(&'static str, &'static str)],
    features: &'static [&'static str],
    stock: i32,
    rating: f64,
    num_reviews: i32,
}

const SAMPLE_PRODUCTS: &[SampleProduct] = &[
    SampleProduct {
        name: "Premium Wireless Headphones",
        description: "High-quality wireless headphones with active noise cancellation, premium comfort, and up to 30 hours of battery life.",
        price: Decimal::from_parts(29999, 0, 0, false, 2),
        category: "electronics",
        subcategory: "headphones",
        brand: "AudioTech",
        sku: "AT-WH-001",
        image: (
            "sample_headphones",
            "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=600",
        ),
        specifications: &[
            ("Driver Size", "40mm"),
            ("Frequency Response", "20Hz - 20kHz"),
            ("Battery Life", "30 hours"),
            ("Connectivity", "Bluetooth 5.0"),
        ],
        features: &[
            "Active Noise Cancellation",
            "30-hour battery life",
            "High-resolution audio",
        ],
        stock: 50,
        rating: 4.8,
        num_reviews: 24,
    },
    SampleProduct {
        name: "Smart Watch Pro",
        description: "Advanced smartwatch with health monitoring features, GPS tracking, and seamless smartphone integration.",
        price: Decimal::from_parts(39999, 0, 0, false, 2),
        category: "electronics",
        subcategory: "wearables",
        brand: "TechWear",
        sku: "TW-SW-002",
        image: (
            "sample_smartwatch",
            "https://images.unsplash.com/photo-1523275335684-37898b6baf30?w=600",
        ),
        specifications: &[
            ("Display", "1.4-inch AMOLED"),
            ("Battery Life", "7 days"),
            ("Water Resistance", "50 meters"),
        ],
        features: &["Heart rate monitoring", "GPS tracking", "Sleep analysis"],
        stock: 30,
        rating: 4.6,
        num_reviews: 18,
    },
    SampleProduct {
        name: "Minimalist Backpack",
        description: "Sleek and functional backpack perfect for everyday use, work, or travel. Made with durable materials.",
        price: Decimal::from_parts(8999, 0, 0, false, 2),
        category: "accessories",
        subcategory: "bags",
        brand: "UrbanCarry",
        sku: "UC-BP-003",
        image: (
            "sample_backpack",
            "https://images.unsplash.com/photo-1553062407-98eeb64c6a62?w=600",
        ),
        specifications: &[
            ("Material", "Water-resistant nylon"),
            ("Capacity", "20 liters"),
            ("Warranty", "2 years"),
        ],
        features: &["Multiple compartments", "Padded laptop sleeve"],
        stock: 75,
        rating: 4.4,
        num_reviews: 32,
    },
    SampleProduct {
        name: "Bluetooth Speaker",
        description: "Portable wireless speaker with premium sound quality, deep bass, and long-lasting battery.",
        price: Decimal::from_parts(14999, 0, 0, false, 2),
        category: "electronics",
        subcategory: "speakers",
        brand: "SoundWave",
        sku: "SW-BS-004",
        image: (
            "sample_speaker",
            "https://images.unsplash.com/photo-1608043152269-423dbba4e7e1?w=600",
        ),
        specifications: &[
            ("Power Output", "20W"),
            ("Battery Life", "12 hours"),
            ("Water Rating", "IPX7"),
        ],
        features: &["360-degree sound", "Voice assistant compatible"],
        stock: 40,
        rating: 4.7,
        num_reviews: 28,
    },
];

const SAMPLE_CATEGORIES: &[(&str, &str)] = &[
    ("Electronics", "Latest electronic gadgets and devices"),
    ("Accessories", "Fashion and lifestyle accessories"),
    ("Clothing", "Fashion apparel for all occasions"),
    ("Home", "Home and kitchen essentials"),
];

pub fn sample_products() -> Vec<Product> {
    SAMPLE_PRODUCTS
        .iter()
        .map(|sample| {
            let input = ProductInput {
                name: sample.name.to_string(),
                description: sample.description.to_string(),
                price: sample.price,
                compare_price: None,
                category: sample.category.to_string(),
                subcategory: sample.subcategory.to_string(),
                brand: sample.brand.to_string(),
                sku: sample.sku.to_string(),
                images: vec![ProductImage {
                    public_id: sample.image.0.to_string(),
                    url: sample.image.1.to_string(),
                    alt: Some(sample.name.to_string()),
                }],
                specifications: sample
                    .specifications
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
                features: sample.features.iter().map(|f| f.to_string()).collect(),
                stock: sample.stock,
                low_stock_threshold: crate::models::DEFAULT_LOW_STOCK_THRESHOLD,
                weight: None,
                dimensions: None,
                is_active: true,
                is_featured: true,
                tags: Vec::new(),
                seo_title: None,
                seo_description: None,
                slug: None,
            };
            let mut product = Product::from_input(input, None);
            product.rating = sample.rating;
            product.num_reviews = sample.num_reviews;
            product
        })
        .collect()
}

pub fn sample_categories() -> Vec<Category> {
    SAMPLE_CATEGORIES
        .iter()
        .map(|(name, description)| {
            Category::from_input(CategoryInput {
                name: name.to_string(),
                description: Some(description.to_string()),
                image: None,
                is_active: Some(true),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_catalogue_is_consistent() {
        let products = sample_products();
        assert_eq!(products.len(), 4);
        assert_eq!(products[0].slug, "premium-wireless-headphones-at-wh-001");
        assert_eq!(products[0].price.to_string(), "299.99");
        assert!(products.iter().all(|p| p.is_featured && p.in_stock()));

        let categories = sample_categories();
        assert_eq!(categories[3].slug, "home");
    }
}
