//! Pure field normalizers shared by every importer.

mod card;
mod expiry;
mod uri;

pub use self::card::card_brand;
pub use self::expiry::{
    is_card_expired, is_card_expired_at, normalize_expiry_year, normalize_expiry_year_at,
    parse_year_month_expiry, parse_year_month_expiry_at,
};
pub use self::uri::{hostname, is_url_in_list, name_from_url};
