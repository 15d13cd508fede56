use crate::domain::ports::IpSource;
use rand::Rng;

/// Random IPv4 addresses for the X-Forwarded-For style rotation some
/// registries expect. First and last octets avoid 0 so the address is
/// always a plausible host.
#[derive(Debug, Default, Clone)]
pub struct RandomIp;

impl RandomIp {
    pub fn new() -> Self {
        Self
    }
}

impl IpSource for RandomIp {
    fn next_ip(&self) -> String {
        let mut rng = rand::thread_rng();
        format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..=255u8),
            rng.gen_range(0..=255u8),
            rng.gen_range(0..=255u8),
            rng.gen_range(1..=255u8)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::IpSource;

    #[test]
    fn test_generated_ip_shape() {
        let source = RandomIp::new();
        for _ in 0..100 {
            let ip = source.next_ip();
            let octets: Vec<&str> = ip.split('.').collect();
            assert_eq!(octets.len(), 4);

            let first: u16 = octets[0].parse().unwrap();
            let last: u16 = octets[3].parse().unwrap();
            assert!((1..=255).contains(&first));
            assert!((1..=255).contains(&last));

            for octet in &octets {
                let value: u16 = octet.parse().unwrap();
                assert!(value <= 255);
            }
        }
    }
}
