//! Sample match-event generator for demo publishers.
//!
//! Produces one-line Spanish match commentary, uniformly picking one of
//! twelve templates and filling in a team or player and, where it
//! applies, a minute in [1, 90]. Deterministic for a given seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const TEAMS: &[&str] = &[
    "Rayados",
    "Tigres",
    "Chivas",
    "América",
    "Cruz Azul",
    "Pumas",
    "Toluca",
    "Santos",
    "León",
    "Pachuca",
    "Atlas",
    "Necaxa",
];

const PLAYERS: &[&str] = &[
    "Martín Olvera",
    "Diego Paredes",
    "Luis Cantú",
    "Emilio Sandoval",
    "Rodrigo Ferreyra",
    "Andrés Quintero",
    "Iker Bustamante",
    "Santiago Mares",
    "Tomás Alcántara",
    "Julián Robles",
    "Mateo Cisneros",
    "Álvaro Peñaloza",
    "Bruno Galindo",
    "Facundo Ibarra",
    "Sebastián Duarte",
    "Nico Arredondo",
];

const TEMPLATE_COUNT: u32 = 12;

/// Deterministic generator of match-event payloads.
pub struct FeedGenerator {
    rng: SmallRng,
}

impl FeedGenerator {
    /// Create a generator. `None` seeds from entropy.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { rng }
    }

    /// Produce the next event line.
    pub fn next_event(&mut self) -> String {
        match self.rng.gen_range(0..TEMPLATE_COUNT) {
            0 => {
                let (team, minute) = (self.team(), self.minute());
                format!("Gol de {team} al minuto {minute}")
            }
            1 => format!("Cambio entra {}", self.player()),
            2 => {
                let (player, minute) = (self.player(), self.minute());
                format!("Tarjeta amarilla 🟨 para {player} al minuto {minute}")
            }
            3 => {
                let (player, minute) = (self.player(), self.minute());
                format!("Tarjeta roja 🟥 para {player} al minuto {minute}")
            }
            4 => format!("Cambio sale {}", self.player()),
            5 => format!("Se agregan 3 minutos al partido en {}", self.team()),
            6 => format!("{} está lesionado y pide atención médica", self.player()),
            7 => {
                let (team, minute) = (self.team(), self.minute());
                format!("Penalti para {team} al minuto {minute}")
            }
            8 => format!("Saque de esquina para {}", self.team()),
            9 => format!("Gran atajada del portero {}", self.player()),
            10 => format!("Comienza el segundo tiempo en {}", self.team()),
            _ => format!("Finaliza el partido en {}", self.team()),
        }
    }

    fn team(&mut self) -> &'static str {
        TEAMS[self.rng.gen_range(0..TEAMS.len())]
    }

    fn player(&mut self) -> &'static str {
        PLAYERS[self.rng.gen_range(0..PLAYERS.len())]
    }

    fn minute(&mut self) -> u32 {
        self.rng.gen_range(1..=90)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_protocol::MAX_MESSAGE_SIZE;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = FeedGenerator::new(Some(7));
        let mut b = FeedGenerator::new(Some(7));

        for _ in 0..100 {
            assert_eq!(a.next_event(), b.next_event());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = FeedGenerator::new(Some(1));
        let mut b = FeedGenerator::new(Some(2));

        let a_events: Vec<String> = (0..20).map(|_| a.next_event()).collect();
        let b_events: Vec<String> = (0..20).map(|_| b.next_event()).collect();
        assert_ne!(a_events, b_events);
    }

    #[test]
    fn events_are_bounded_and_nonempty() {
        let mut generator = FeedGenerator::new(Some(42));

        for _ in 0..1000 {
            let event = generator.next_event();
            assert!(!event.is_empty());
            assert!(event.len() < 256);
            assert!(event.len() <= MAX_MESSAGE_SIZE);
        }
    }
}
