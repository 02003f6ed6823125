use crate::types::ComplianceResponse;

/// Known fire-safety documents and their canonical URLs, in lookup order.
const CATALOG: &[(&str, &str)] = &[
    (
        "QCVN 06:2022/BXD",
        "https://thuvienphapluat.vn/van-ban/Xay-dung-Do-thi/Thong-tu-06-2022-TT-BXD-QCVN-06-2022-BXD-quy-chuan-ky-thuat-quoc-gia-an-toan-chay-cho-nha-va-cong-trinh-547038.aspx",
    ),
    (
        "QCVN 06:2021/BXD",
        "https://thuvienphapluat.vn/van-ban/Xay-dung-Do-thi/Thong-tu-02-2021-TT-BXD-QCVN-06-2021-BXD-Quy-chuan-ky-thuat-quoc-gia-ve-an-toan-chay-cho-nha-va-cong-trinh-473950.aspx",
    ),
    (
        "QCVN 01:2021/BXD",
        "https://thuvienphapluat.vn/van-ban/Xay-dung-Do-thi/Thong-tu-01-2021-TT-BXD-QCVN-01-2021-BXD-Quy-chuan-ky-thuat-quoc-gia-ve-quy-hoach-xay-dung-473949.aspx",
    ),
    (
        "TCVN 3890:2023",
        "https://thuvienphapluat.vn/van-ban/The-thao-Y-te/Tieu-chuan-quoc-gia-TCVN-3890-2023-ve-Phong-chay-chua-chay-Phuong-tien-phong-chay-va-chua-chay-cho-nha-va-cong-trinh-558237.aspx",
    ),
    (
        "TCVN 5738:2021",
        "https://thuvienphapluat.vn/tieu-chuan/tcvn-5738-2021-he-thong-bao-chay-tu-dong-yeu-cau-ky-thuat-466318.aspx",
    ),
    (
        "TCVN 7336:2021",
        "https://thuvienphapluat.vn/tieu-chuan/tcvn-7336-2021-he-thong-chua-chay-tu-dong-bang-nuoc-yeu-cau-ky-thuat-466321.aspx",
    ),
    (
        "TCVN 2622:1995",
        "https://thuvienphapluat.vn/van-ban/Xay-dung-Do-thi/Tieu-chuan-Viet-Nam-TCVN-2622-1995-Phong-chay-chong-chay-cho-nha-va-cong-trinh-Yeu-cau-thiet-ke-19129.aspx",
    ),
    (
        "Nghị định 136/2020/NĐ-CP",
        "https://thuvienphapluat.vn/van-ban/Tai-nguyen-Moi-truong/Nghi-dinh-136-2020-ND-CP-huong-dan-Luat-Phong-chay-va-chua-chay-453000.aspx",
    ),
];

/// Number fragments that identify a document on their own.
const FALLBACKS: &[(&str, &str)] = &[
    ("3890", "TCVN 3890:2023"),
    ("06:2022", "QCVN 06:2022/BXD"),
    ("06/2022", "QCVN 06:2022/BXD"),
    ("5738", "TCVN 5738:2021"),
    ("7336", "TCVN 7336:2021"),
    ("136/2020", "Nghị định 136/2020/NĐ-CP"),
];

fn lookup(key: &str) -> Option<&'static str> {
    CATALOG.iter().find(|(k, _)| *k == key).map(|(_, url)| *url)
}

/// Canonical URL for a citation source such as `"TCVN 5738"` or
/// `"QCVN 06:2022/BXD"`, if the document is known.
pub fn resolve_url(source: &str) -> Option<&'static str> {
    let clean = source.trim().to_uppercase();
    if clean.is_empty() {
        return None;
    }

    if let Some((_, url)) = CATALOG.iter().find(|(key, _)| key.to_uppercase() == clean) {
        return Some(*url);
    }

    // "TCVN 3890" for "TCVN 3890:2023", or a longer title that embeds the code.
    for (key, url) in CATALOG {
        let key = key.to_uppercase();
        let stem = key.split(':').next().unwrap_or(key.as_str());
        if key.contains(&clean) || clean.contains(stem) {
            return Some(*url);
        }
    }

    FALLBACKS
        .iter()
        .find(|(fragment, _)| source.contains(fragment))
        .and_then(|(_, key)| lookup(key))
}

/// Replace model-supplied links with catalog URLs wherever the source is known.
pub fn apply_catalog(response: &mut ComplianceResponse) {
    for citation in &mut response.citations {
        if let Some(url) = resolve_url(&citation.source) {
            citation.url = Some(url.to_string());
        }
    }
    for reference in response.references_mut() {
        if let Some(url) = resolve_url(&reference.source) {
            reference.url = Some(url.to_string());
        }
    }
}
