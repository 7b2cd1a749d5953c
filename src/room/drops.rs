//! Deterministic death-drop coin synthesis.
//!
//! When a kill report wins the race, the server mints `coin_reward` coins
//! with placement and velocity derived purely from the enemy's truncated
//! coordinates and the drop index. The host client runs the same formulas
//! locally, so the ids and trajectories line up on every screen without a
//! round trip. The id format `coin_drop_<ex>_<ey>_<i>` is a wire contract.

use crate::protocol::{Coin, Enemy};

/// Synthesize the death-drop coins for a killed enemy.
pub fn death_drop_coins(enemy: &Enemy) -> Vec<Coin> {
    let ex = enemy.x.trunc() as i64;
    let ey = enemy.y.trunc() as i64;

    (0..i64::from(enemy.coin_reward))
        .map(|i| {
            let offset_x = (ex * 7 + i * 13).rem_euclid(61) - 30;
            let offset_y = (ey * 11 + i * 17).rem_euclid(21) - 20;
            let velocity_x = (ex * 3 + i * 19).rem_euclid(201) - 100;
            let velocity_y = -200 + (ey * 5 + i * 23).rem_euclid(101);

            Coin {
                coin_id: format!("coin_drop_{ex}_{ey}_{i}"),
                x: (ex + offset_x) as f64,
                y: (ey + offset_y) as f64,
                velocity_x: velocity_x as f64,
                velocity_y: velocity_y as f64,
                is_collected: false,
                collected_by: None,
                value: 1,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enemy_at(x: f64, y: f64, coin_reward: u32) -> Enemy {
        serde_json::from_value(serde_json::json!({
            "enemy_id": "e1",
            "enemy_type": "slimeGreen",
            "x": x,
            "y": y,
            "coin_reward": coin_reward
        }))
        .unwrap()
    }

    #[test]
    fn test_drop_ids_follow_the_wire_contract() {
        let drops = death_drop_coins(&enemy_at(100.0, 300.0, 3));
        let ids: Vec<&str> = drops.iter().map(|c| c.coin_id.as_str()).collect();
        assert_eq!(
            ids,
            ["coin_drop_100_300_0", "coin_drop_100_300_1", "coin_drop_100_300_2"]
        );
    }

    #[test]
    fn test_drop_placement_and_velocity_formulas() {
        let drops = death_drop_coins(&enemy_at(100.0, 300.0, 1));
        let coin = &drops[0];

        // offset_x = (700 mod 61) - 30 = -1; offset_y = (3300 mod 21) - 20 = -17
        assert_eq!(coin.x, 99.0);
        assert_eq!(coin.y, 283.0);
        // vel_x = (300 mod 201) - 100 = -1; vel_y = -200 + (1500 mod 101) = -114
        assert_eq!(coin.velocity_x, -1.0);
        assert_eq!(coin.velocity_y, -114.0);
        assert_eq!(coin.value, 1);
        assert!(!coin.is_collected);
    }

    #[test]
    fn test_coordinates_truncate_toward_zero() {
        let drops = death_drop_coins(&enemy_at(100.9, 300.7, 1));
        assert_eq!(drops[0].coin_id, "coin_drop_100_300_0");

        let drops = death_drop_coins(&enemy_at(-5.5, -7.9, 1));
        assert_eq!(drops[0].coin_id, "coin_drop_-5_-7_0");
    }

    #[test]
    fn test_negative_coordinates_stay_in_range() {
        for coin in death_drop_coins(&enemy_at(-321.0, -654.0, 8)) {
            let dx = coin.x - (-321.0);
            let dy = coin.y - (-654.0);
            assert!((-30.0..=30.0).contains(&dx), "offset_x {dx} out of range");
            assert!((-20.0..=0.0).contains(&dy), "offset_y {dy} out of range");
            assert!((-100.0..=100.0).contains(&coin.velocity_x));
            assert!((-200.0..=-100.0).contains(&coin.velocity_y));
        }
    }

    #[test]
    fn test_zero_reward_yields_no_drops() {
        assert!(death_drop_coins(&enemy_at(10.0, 10.0, 0)).is_empty());
    }
}
