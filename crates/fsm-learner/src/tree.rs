use fsm_core::math::Domain;
use fsm_core::{Input, Output, Sequence, StateId, DEFAULT_OUTPUT, NULL_STATE};

/// Arena index into [`ObservationTree::nodes`]. Cheap, `Copy`, and stable
/// for the lifetime of a run — nodes are never removed (spec.md §3
/// Lifecycle), only reinterpreted (e.g. marked `WRONG_STATE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Arena index into [`ObservationTree::cns`]. Non-reference CN shells may
/// become unreachable after a merge, but their slot is never reused or
/// freed — this is the arena strategy the Design Notes recommend in place
/// of `Rc`/`Weak` cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CnId(pub u32);

/// A node's belief about which conjecture state it corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssumedState {
    NotQueried,
    QueriedNotRn,
    QueriedRn,
}

/// A node of the observation tree (spec.md §3). `next` is sparse, indexed
/// by input.
#[derive(Debug, Clone)]
pub struct OTreeNode {
    pub parent: Option<NodeId>,
    pub incoming_input: Option<Input>,
    pub incoming_output: Output,
    pub state_output: Output,
    pub access_sequence: Sequence,
    pub next: Vec<Option<NodeId>>,
    /// Candidate conjecture states this node could correspond to.
    pub domain: Domain,
    pub state: StateId,
    pub assumed_state: AssumedState,
    pub last_queried_input: Option<Input>,
    pub max_suffix_len: i64,
    pub convergent_node: CnId,
}

impl OTreeNode {
    pub fn is_wrong_state(&self) -> bool {
        self.state == fsm_core::WRONG_STATE
    }

    pub fn is_null_state(&self) -> bool {
        self.state == NULL_STATE
    }
}

/// An equivalence class of OT nodes believed to reach the same black-box
/// state (spec.md §3). `domain` lives in the *other* index space from
/// [`OTreeNode::domain`]: for a non-reference CN it is the set of
/// reference-CN ids (by [`CnId`]) it could collapse into; for a reference
/// CN it is the set of non-reference CN ids that could collapse into it.
/// This mirrors the original's `set<state_t>` vs `set<ConvergentNode*>`
/// split exactly.
#[derive(Debug, Clone)]
pub struct ConvergentNode {
    /// First element is the representative (shortest access sequence).
    pub convergent: Vec<NodeId>,
    pub is_rn: bool,
    pub domain: Domain,
    pub next: Vec<Option<CnId>>,
    pub state: Option<StateId>,
}

impl ConvergentNode {
    pub fn representative(&self) -> NodeId {
        self.convergent[0]
    }
}

/// The observation tree plus its convergent-node overlay (spec.md §3 "OTree
/// aggregate"). Owns every [`OTreeNode`] and [`ConvergentNode`] ever
/// created during a run.
pub struct ObservationTree {
    pub nodes: Vec<OTreeNode>,
    pub cns: Vec<ConvergentNode>,
    /// Reference CN per conjecture state.
    pub rn: Vec<CnId>,
    /// Current extra-state verification budget.
    pub es: u32,
    pub num_inputs: u32,
    /// The OT node the black box is currently positioned at, i.e. the node
    /// whose access sequence equals the sequence of inputs actually applied
    /// to the teacher since its last reset. Lets `query` skip the
    /// reset-and-replay when the caller is already there, mirroring
    /// `TeacherBB`'s `_bbState` caching.
    pub bb_node: NodeId,
}

impl ObservationTree {
    /// Creates the tree with just a root node mapped to state 0.
    pub fn new(num_inputs: u32, num_states_hint: usize) -> Self {
        let root = OTreeNode {
            parent: None,
            incoming_input: None,
            incoming_output: DEFAULT_OUTPUT,
            state_output: DEFAULT_OUTPUT,
            access_sequence: Sequence::empty(),
            next: vec![None; num_inputs as usize],
            domain: {
                let mut d = Domain::with_capacity(num_states_hint.max(1));
                d.insert(0);
                d
            },
            state: 0,
            assumed_state: AssumedState::QueriedRn,
            last_queried_input: None,
            max_suffix_len: i64::MAX,
            convergent_node: CnId(0),
        };
        let root_cn = ConvergentNode {
            convergent: vec![NodeId(0)],
            is_rn: true,
            domain: Domain::new(),
            next: vec![None; num_inputs as usize],
            state: Some(0),
        };
        ObservationTree {
            nodes: vec![root],
            cns: vec![root_cn],
            rn: vec![CnId(0)],
            es: 0,
            num_inputs,
            bb_node: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &OTreeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut OTreeNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn cn(&self, id: CnId) -> &ConvergentNode {
        &self.cns[id.0 as usize]
    }

    pub fn cn_mut(&mut self, id: CnId) -> &mut ConvergentNode {
        &mut self.cns[id.0 as usize]
    }

    pub fn cn_of(&self, node: NodeId) -> CnId {
        self.node(node).convergent_node
    }

    /// Grows every existing node/CN's `next` row to accommodate a larger
    /// input alphabet (spec.md §4.1 alphabet growth).
    pub fn grow_inputs(&mut self, new_size: u32) {
        if new_size <= self.num_inputs {
            return;
        }
        for n in &mut self.nodes {
            n.next.resize(new_size as usize, None);
        }
        for cn in &mut self.cns {
            cn.next.resize(new_size as usize, None);
        }
        self.num_inputs = new_size;
    }

    /// Allocates a new, unlinked OT node as the `input`-child of `parent`.
    pub fn push_node(&mut self, parent: NodeId, input: Input, incoming_output: Output) -> NodeId {
        let parent_seq = self.node(parent).access_sequence.appended(input);
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(OTreeNode {
            parent: Some(parent),
            incoming_input: Some(input),
            incoming_output,
            state_output: DEFAULT_OUTPUT,
            access_sequence: parent_seq,
            next: vec![None; self.num_inputs as usize],
            domain: Domain::new(),
            state: NULL_STATE,
            assumed_state: AssumedState::NotQueried,
            last_queried_input: None,
            max_suffix_len: 0,
            convergent_node: CnId(0),
        });
        id
    }

    /// Allocates a new non-reference CN whose sole member is `node`.
    pub fn push_cn_for_node(&mut self, node: NodeId) -> CnId {
        let id = CnId(self.cns.len() as u32);
        self.cns.push(ConvergentNode {
            convergent: vec![node],
            is_rn: false,
            domain: Domain::new(),
            next: vec![None; self.num_inputs as usize],
            state: None,
        });
        self.node_mut(node).convergent_node = id;
        id
    }

    pub fn num_states(&self) -> usize {
        self.rn.len()
    }

    /// Walks `parent` links from `node` up to (and including) the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut cur = node;
        while let Some(p) = self.node(cur).parent {
            out.push(p);
            cur = p;
        }
        out
    }

    /// The nearest ancestor of `node` (inclusive) whose assumed state is
    /// `QueriedRn`, i.e. is itself a reference node.
    pub fn nearest_reference_ancestor(&self, node: NodeId) -> NodeId {
        let mut cur = node;
        loop {
            if self.node(cur).assumed_state == AssumedState::QueriedRn {
                return cur;
            }
            match self.node(cur).parent {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    /// Records that `cn` and the reference CN `rn_cn` are compatible: `rn_cn`
    /// joins `cn`'s domain and `cn` joins `rn_cn`'s own (spec.md §3 Invariant
    /// 5, "domain membership is symmetric").
    pub fn link_domain(&mut self, cn: CnId, rn_cn: CnId) {
        self.cn_mut(cn).domain.insert(rn_cn.0 as usize);
        self.cn_mut(rn_cn).domain.insert(cn.0 as usize);
    }

    /// The inverse of [`ObservationTree::link_domain`]: `cn` and `rn_cn` are
    /// no longer compatible candidates for one another.
    pub fn unlink_domain(&mut self, cn: CnId, rn_cn: CnId) {
        self.cn_mut(cn).domain.remove(rn_cn.0 as usize);
        self.cn_mut(rn_cn).domain.remove(cn.0 as usize);
    }
}
