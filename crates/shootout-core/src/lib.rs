pub mod net;
pub mod player;
pub mod room;
pub mod zone;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{Participant, ParticipantId, Role};
    use crate::room::MatchSnapshot;

    /// Create a participant with the given identity; the display name is the
    /// identity capitalised.
    pub fn make_participant(id: &str, role: Role) -> Participant {
        let mut name = id.to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Participant::new(ParticipantId::new(id), &name, role)
    }

    /// A shooter/goalkeeper pair in join order.
    pub fn make_pair() -> Vec<Participant> {
        vec![
            make_participant("alice", Role::Shooter),
            make_participant("bob", Role::Goalkeeper),
        ]
    }

    /// Find a participant's score in a snapshot.
    pub fn snapshot_score(snapshot: &MatchSnapshot, id: &str) -> Option<u32> {
        snapshot
            .participants
            .iter()
            .find(|p| p.id.as_str() == id)
            .map(|p| p.score)
    }
}
