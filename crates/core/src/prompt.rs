use serde_json::Value;

use crate::models::Item;

const UNKNOWN: &str = "Unknown";

/// Builds the instruction sent verbatim to the remote estimator.
///
/// The text is deterministic for a given item and distance. Missing fields
/// render as `Unknown`.
pub fn build_estimation_prompt(item: &Item, distance_km: Option<f64>) -> String {
    let name = text_or_unknown(item.name.as_deref());
    let quantity = scalar_or_unknown(item.quantity.as_ref());
    let price = scalar_or_unknown(item.price.as_ref());
    let location = text_or_unknown(item.source_location.as_deref());
    let pincode = text_or_unknown(item.resolved_pincode());
    let origin = text_or_unknown(item.country_of_origin.as_deref());
    let ean = text_or_unknown(item.ean_code.as_deref());
    // Zero reads as unknown in the details but stays 0 in the instructions.
    let distance = distance_km
        .filter(|km| *km != 0.0)
        .map(|km| km.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let transport_km = distance_km.unwrap_or(0.0);

    format!(
        "You are a carbon footprint calculation expert. Calculate the total carbon footprint in kg CO2 \
for the following grocery item, with special emphasis on transportation emissions based on distance.

Item Details:
- Name: {name}
- Quantity: {quantity}
- Price: ₹{price}
- Source Location: {location}
- Source Pincode: {pincode}
- Country of Origin: {origin}
- EAN Code: {ean}
- Distance Traveled: {distance} km

Calculation Instructions:
1. Estimate the base footprint for production, packaging and storage of this item, excluding transport.
2. Estimate transport emissions from the distance traveled:
   - Road transport: 0.12 kg CO2 per km per kg of goods
   - Air freight (if imported): 0.6 kg CO2 per km per kg of goods
   - Sea freight (if imported): 0.02 kg CO2 per km per kg of goods
3. Adjust for item type:
   - Fresh produce: lower base footprint
   - Processed foods: higher base footprint
   - Packaged goods: include packaging material emissions
4. Add 10-30% for cold chain if the item needs refrigeration.

Important:
- The distance ({transport_km} km) is the key factor for transportation emissions.
- Weight the transportation component heavily.
- Respond with a single number in kg CO2.

Example Calculation Format:
Base production footprint: X kg CO2
Transportation ({transport_km} km): Y kg CO2
Total: Z kg CO2

Final Answer (provide only this number): Z
"
    )
}

fn text_or_unknown(value: Option<&str>) -> &str {
    value.filter(|text| !text.is_empty()).unwrap_or(UNKNOWN)
}

fn scalar_or_unknown(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
