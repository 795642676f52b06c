use anyhow::{Context, Result};
use url::Url;

use crate::models::Vehicle;

/// Formats a KES amount with thousands separators, e.g. `3,500,000`
pub fn format_kes(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    match frac {
        0 => format!("{sign}{grouped}"),
        f if f % 10 == 0 => format!("{sign}{grouped}.{}", f / 10),
        f => format!("{sign}{grouped}.{f:02}"),
    }
}

pub fn inquiry_message(dealer: &str, vehicle: &Vehicle) -> String {
    format!(
        "Hi {dealer}, I am interested in the {} {} {} listed for KES {}. Is it still available?",
        vehicle.year,
        vehicle.make,
        vehicle.model,
        format_kes(vehicle.price)
    )
}

/// WhatsApp deep link prefilled with an inquiry about `vehicle`
pub fn whatsapp_link(number: &str, dealer: &str, vehicle: &Vehicle) -> Result<Url> {
    let mut url = Url::parse("https://wa.me/").context("Invalid WhatsApp base URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("WhatsApp URL cannot carry a number"))?
        .pop_if_empty()
        .push(number.trim_start_matches('+'));
    url.query_pairs_mut()
        .append_pair("text", &inquiry_message(dealer, vehicle));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Specs, Status};

    fn harrier() -> Vehicle {
        Vehicle {
            id: "h".into(),
            make: "Toyota".into(),
            model: "Harrier".into(),
            year: 2021,
            price: 3_500_000.0,
            status: Status::Available,
            main_image: None,
            image_gallery: vec![],
            is_featured: false,
            specs: Specs::new(),
            created_at: None,
        }
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(format_kes(3_500_000.0), "3,500,000");
        assert_eq!(format_kes(950.0), "950");
        assert_eq!(format_kes(0.0), "0");
        assert_eq!(format_kes(1234.5), "1,234.5");
        assert_eq!(format_kes(1_000_000.25), "1,000,000.25");
    }

    #[test]
    fn link_carries_the_inquiry() {
        let url = whatsapp_link("+254721590781", "TajireeAuto", &harrier()).unwrap();
        assert_eq!(url.host_str(), Some("wa.me"));
        assert_eq!(url.path(), "/254721590781");

        let text = url
            .query_pairs()
            .find(|(k, _)| k == "text")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(
            text,
            "Hi TajireeAuto, I am interested in the 2021 Toyota Harrier listed for KES 3,500,000. Is it still available?"
        );
    }
}
