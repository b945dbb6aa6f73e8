/// Masks a credential for logging: the first four characters survive.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJh***");
        assert_eq!(mask_token("ab"), "ab***");
        assert_eq!(mask_token(""), "***");
    }
}
